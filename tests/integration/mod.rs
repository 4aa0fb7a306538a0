// Integration tests for Prisbevakaren
// These tests drive the store, orchestrator and notifier together against a
// temporary data directory.

pub mod pipeline_tests;
pub mod store_tests;
pub mod webhook_tests;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use prisbevakaren::config::{ScraperConfig, StoreConfig};
use prisbevakaren::utils::FixedClock;
use prisbevakaren::{
    AppError, ExtractionFailure, FetchRequest, Fetcher, JsonStore, Notifier, Orchestrator, WebhookTransport,
};

pub const WEBHOOK: &str = "https://hooks.example/services/T000/B000/XXXX";

pub fn test_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 10, 6, 0, 0).unwrap()
}

pub fn test_scraper_config() -> ScraperConfig {
    ScraperConfig {
        request_timeout: 5,
        max_concurrent_checks: 2,
        retry_attempts: 0,
        retry_delay_ms: 10,
        use_browser: false,
        ..ScraperConfig::default()
    }
}

pub fn test_store(dir: &TempDir) -> JsonStore {
    JsonStore::new(&StoreConfig {
        data_dir: dir.path().to_path_buf(),
        lock_timeout_ms: 300,
        ..StoreConfig::default()
    })
}

/// Serves canned pages by URL and records which URLs were requested.
#[derive(Default)]
pub struct StaticFetcher {
    pages: Mutex<HashMap<String, Result<String, ExtractionFailure>>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: &str) {
        self.pages.lock().unwrap().insert(url.to_string(), Ok(body.to_string()));
    }

    pub fn fail(&self, url: &str, failure: ExtractionFailure) {
        self.pages.lock().unwrap().insert(url.to_string(), Err(failure));
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<String, ExtractionFailure> {
        self.requests.lock().unwrap().push(request.clone());
        self.pages
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Err(ExtractionFailure::fetch(format!("{} returned HTTP 404 Not Found", request.url))))
    }
}

/// Collects webhook payloads instead of sending them.
#[derive(Default)]
pub struct RecordingTransport {
    pub posts: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingTransport {
    pub fn texts(&self) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| payload["text"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl WebhookTransport for RecordingTransport {
    async fn post(&self, endpoint: &str, payload: &serde_json::Value) -> Result<(), AppError> {
        self.posts
            .lock()
            .unwrap()
            .push((endpoint.to_string(), payload.clone()));
        Ok(())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub store: JsonStore,
    pub fetcher: Arc<StaticFetcher>,
    pub transport: Arc<RecordingTransport>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let store = test_store(&dir);
        Self {
            dir,
            store,
            fetcher: Arc::new(StaticFetcher::new()),
            transport: Arc::new(RecordingTransport::default()),
            clock: Arc::new(FixedClock::new(test_time())),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        let notifier = Notifier::new(Some(WEBHOOK.to_string()), Some("prisbevakaren".to_string()), self.transport.clone());
        Orchestrator::new(
            self.store.clone(),
            self.fetcher.clone(),
            self.clock.clone(),
            notifier,
            test_scraper_config(),
        )
    }
}

pub fn willys_page(whole: &str, decimals: &str) -> String {
    format!(
        r#"<html><body><div class="product-card">
             <h1>Kaffe Mellanrost 450g</h1>
             <div class="price-wrapper">
               <span class="whole"><span>{}</span></span>
               <span class="decimals"><span>{}</span></span>
               <span class="unit">/st</span>
             </div>
           </div></body></html>"#,
        whole, decimals
    )
}

pub fn jula_page(price: &str) -> String {
    format!(
        r#"<html><body><h1>Skruvdragare 18V</h1><div class="price">{}</div></body></html>"#,
        price
    )
}
