//! Page retrieval. The orchestrator only sees the [`Fetcher`] trait so tests
//! can serve canned pages.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ScraperConfig;
use crate::extraction::ExtractionFailure;
use crate::utils::Result;

#[cfg(feature = "browser")]
pub mod browser;
pub mod http;

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use http::HttpFetcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub timeout: Duration,
    /// Ask for a JavaScript-rendered page when a renderer is available.
    pub render: bool,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            render: false,
        }
    }

    pub fn rendered(mut self, render: bool) -> Self {
        self.render = render;
        self
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the page body. Every failure maps to `FetchFailed`.
    async fn fetch(&self, request: &FetchRequest) -> std::result::Result<String, ExtractionFailure>;
}

/// Routes rendering requests to a browser when one is configured and falls
/// back to plain HTTP otherwise.
pub struct PageFetcher {
    http: Arc<dyn Fetcher>,
    renderer: Option<Arc<dyn Fetcher>>,
}

impl PageFetcher {
    pub fn new(http: Arc<dyn Fetcher>, renderer: Option<Arc<dyn Fetcher>>) -> Self {
        Self { http, renderer }
    }

    pub fn from_config(config: &ScraperConfig) -> Result<Self> {
        let http: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(config)?);
        Ok(Self::new(http, Self::renderer_from_config(config)))
    }

    #[cfg(feature = "browser")]
    fn renderer_from_config(config: &ScraperConfig) -> Option<Arc<dyn Fetcher>> {
        if !config.use_browser {
            return None;
        }
        let renderer: Arc<dyn Fetcher> = Arc::new(BrowserFetcher::new(config));
        Some(renderer)
    }

    #[cfg(not(feature = "browser"))]
    fn renderer_from_config(config: &ScraperConfig) -> Option<Arc<dyn Fetcher>> {
        if config.use_browser {
            tracing::debug!("Built without the browser feature; rendered pages are fetched over HTTP");
        }
        None
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }
}

#[async_trait]
impl Fetcher for PageFetcher {
    async fn fetch(&self, request: &FetchRequest) -> std::result::Result<String, ExtractionFailure> {
        let Some(renderer) = self.renderer.as_ref().filter(|_| request.render) else {
            return self.http.fetch(request).await;
        };

        match renderer.fetch(request).await {
            Ok(body) => Ok(body),
            Err(failure) => {
                tracing::warn!(
                    "Rendered fetch of {} failed ({}), retrying over HTTP",
                    request.url,
                    failure.detail
                );
                self.http.fetch(request).await
            }
        }
    }
}
