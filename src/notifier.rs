//! Failure summaries posted to an incoming webhook (Slack or Discord
//! compatible `{"text": ...}` payloads).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::config::NotificationsConfig;
use crate::orchestrator::UpdateReport;
use crate::utils::error::{AppError, Result};

const MAX_LISTED_FAILURES: usize = 10;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(&self, endpoint: &str, payload: &serde_json::Value) -> Result<()>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn post(&self, endpoint: &str, payload: &serde_json::Value) -> Result<()> {
        let response = self.client.post(endpoint).json(payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Webhook(format!("{} returned {}: {}", endpoint, status, body)));
        }
        Ok(())
    }
}

pub struct Notifier {
    endpoint: Option<String>,
    username: Option<String>,
    transport: Arc<dyn WebhookTransport>,
}

impl Notifier {
    pub fn new(endpoint: Option<String>, username: Option<String>, transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            endpoint,
            username,
            transport,
        }
    }

    pub fn from_config(config: &NotificationsConfig) -> Result<Self> {
        Ok(Self::new(
            config.webhook_url.clone(),
            config.username.clone(),
            Arc::new(ReqwestTransport::new()?),
        ))
    }

    /// A notifier that never sends anything.
    pub fn disabled(transport: Arc<dyn WebhookTransport>) -> Self {
        Self::new(None, None, transport)
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn payload(&self, report: &UpdateReport) -> serde_json::Value {
        let mut payload = json!({ "text": format_failure_summary(report) });
        if let Some(username) = &self.username {
            payload["username"] = json!(username);
        }
        payload
    }

    /// Posts the failure summary. Delivery problems are logged, never returned.
    pub async fn notify(&self, report: &UpdateReport) {
        let Some(endpoint) = &self.endpoint else {
            tracing::debug!("Webhook not configured, skipping failure notification");
            return;
        };

        match self.transport.post(endpoint, &self.payload(report)).await {
            Ok(()) => {
                tracing::info!("Sent failure summary for {} failed urls", report.failed_count());
                metrics::counter!("prisbevakaren_notifications_sent_total").increment(1);
            }
            Err(e) => {
                tracing::warn!("Failed to send failure summary: {}", e);
                metrics::counter!("prisbevakaren_notification_failures_total").increment(1);
            }
        }
    }
}

pub fn format_failure_summary(report: &UpdateReport) -> String {
    let emoji = if report.all_failed() { "❌" } else { "⚠️" };
    let mut summary = format!("{} *Price Update Job Completed with Errors*\n\n", emoji);
    summary.push_str(&format!("Total: {}\n", report.processed_count));
    summary.push_str(&format!("Succeeded: {}\n", report.succeeded_count));
    summary.push_str(&format!("Failed: {}", report.failed_count()));

    if report.has_failures() {
        summary.push_str("\nFailed URLs:");
        for failure in report.failures.iter().take(MAX_LISTED_FAILURES) {
            summary.push_str(&format!(
                "\n• {} ({}): {}: {}",
                failure.url, failure.group_name, failure.kind, failure.detail
            ));
        }
        if report.failed_count() > MAX_LISTED_FAILURES {
            summary.push_str(&format!("\n... and {} more", report.failed_count() - MAX_LISTED_FAILURES));
        }
    }
    summary
}
