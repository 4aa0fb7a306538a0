use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;

use super::{FetchRequest, Fetcher};
use crate::config::ScraperConfig;
use crate::extraction::ExtractionFailure;
use crate::utils::Result;

/// Plain HTTP GET with a fixed-interval retry.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            retry_attempts: config.retry_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    async fn fetch_once(&self, request: &FetchRequest) -> std::result::Result<String, ExtractionFailure> {
        let response = self
            .client
            .get(&request.url)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| describe_error(&request.url, e))?;

        let response = response
            .error_for_status()
            .map_err(|e| describe_error(&request.url, e))?;

        response.text().await.map_err(|e| {
            if e.is_decode() {
                ExtractionFailure::parse(format!("undecodable body from {}: {}", request.url, e))
            } else {
                describe_error(&request.url, e)
            }
        })
    }
}

fn describe_error(url: &str, error: reqwest::Error) -> ExtractionFailure {
    if error.is_timeout() {
        ExtractionFailure::fetch(format!("timed out fetching {}", url))
    } else if let Some(status) = error.status() {
        ExtractionFailure::fetch(format!("{} returned HTTP {}", url, status))
    } else {
        ExtractionFailure::fetch(format!("request to {} failed: {}", url, error))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> std::result::Result<String, ExtractionFailure> {
        let strategy = FixedInterval::new(self.retry_delay).take(self.retry_attempts as usize);
        let result = Retry::spawn(strategy, || async {
            let attempt = self.fetch_once(request).await;
            if let Err(failure) = &attempt {
                tracing::debug!("Fetch attempt failed: {}", failure.detail);
            }
            attempt
        })
        .await;

        if result.is_ok() {
            metrics::counter!("prisbevakaren_http_fetches_total").increment(1);
        } else {
            metrics::counter!("prisbevakaren_http_fetch_failures_total").increment(1);
        }
        result
    }
}
