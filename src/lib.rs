pub mod config;
pub mod extraction;
pub mod fetcher;
pub mod models;
pub mod notifier;
pub mod orchestrator;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use extraction::{ExtractionFailure, FailureKind, Strategy};
pub use fetcher::{FetchRequest, Fetcher, HttpFetcher, PageFetcher};
pub use notifier::{Notifier, WebhookTransport};
pub use orchestrator::{Orchestrator, UpdateFailure, UpdateReport};
pub use store::{JsonStore, StoreSnapshot};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
