//! Headless Chrome rendering for sites that build their price client-side.

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{FetchRequest, Fetcher};
use crate::config::ScraperConfig;
use crate::extraction::ExtractionFailure;

pub struct BrowserFetcher {
    user_agent: String,
    chrome_path: Option<String>,
    // Launched on first use so runs without rendered sites never start Chrome.
    browser: Mutex<Option<Arc<Browser>>>,
}

/// Starts Chrome. Blocks for as long as the process takes to come up.
fn launch(chrome_path: Option<String>) -> Result<Arc<Browser>, ExtractionFailure> {
    let mut launch_options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false)
        .args(vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-extensions"),
        ])
        .build()
        .map_err(|e| ExtractionFailure::fetch(format!("invalid browser launch options: {}", e)))?;

    if let Some(chrome_path) = chrome_path {
        launch_options.path = Some(PathBuf::from(chrome_path));
    }

    let browser = Browser::new(launch_options)
        .map_err(|e| ExtractionFailure::fetch(format!("failed to launch browser: {}", e)))?;
    tracing::info!("Launched headless browser");
    Ok(Arc::new(browser))
}

impl BrowserFetcher {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            chrome_path: config.chrome_path.clone(),
            browser: Mutex::new(None),
        }
    }

    /// Shared browser handle. Concurrent first callers wait on the slot, so
    /// only one Chrome is started.
    async fn browser(&self) -> Result<Arc<Browser>, ExtractionFailure> {
        let mut slot = self.browser.lock().await;
        if let Some(browser) = slot.as_ref() {
            return Ok(browser.clone());
        }

        let chrome_path = self.chrome_path.clone();
        let browser = tokio::task::spawn_blocking(move || launch(chrome_path))
            .await
            .map_err(|e| ExtractionFailure::fetch(format!("browser launch task failed: {}", e)))??;
        *slot = Some(browser.clone());
        Ok(browser)
    }

    fn render(browser: &Browser, user_agent: &str, request: &FetchRequest) -> Result<String, ExtractionFailure> {
        let tab = browser
            .new_tab()
            .map_err(|e| ExtractionFailure::fetch(format!("failed to open tab: {}", e)))?;
        tab.set_default_timeout(request.timeout);
        tab.set_user_agent(user_agent, None, None)
            .map_err(|e| ExtractionFailure::fetch(format!("failed to set user agent: {}", e)))?;

        let content = tab
            .navigate_to(&request.url)
            .and_then(|tab| tab.wait_until_navigated())
            .and_then(|tab| tab.get_content())
            .map_err(|e| ExtractionFailure::fetch(format!("rendering {} failed: {}", request.url, e)));

        if let Err(e) = tab.close(true) {
            tracing::debug!("Failed to close tab for {}: {}", request.url, e);
        }
        content
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<String, ExtractionFailure> {
        let browser = self.browser().await?;
        let user_agent = self.user_agent.clone();
        let request = request.clone();

        let result = tokio::task::spawn_blocking(move || Self::render(&browser, &user_agent, &request))
            .await
            .map_err(|e| ExtractionFailure::fetch(format!("render task failed: {}", e)))?;

        if result.is_err() {
            // Drop a browser that may have died so the next fetch relaunches it.
            *self.browser.lock().await = None;
        }
        result
    }
}
