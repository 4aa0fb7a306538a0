use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Duplicate entry: {url} is already tracked in group {group_id}")]
    DuplicateEntry { group_id: Uuid, url: String },

    #[error("Corrupt store file {}: {reason}", path.display())]
    CorruptStore { path: PathBuf, reason: String },

    #[error("Store busy: lock {} not acquired within {waited_ms} ms", lock_path.display())]
    StoreBusy { lock_path: PathBuf, waited_ms: u64 },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Webhook delivery failed: {0}")]
    Webhook(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

impl AppError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound { resource: resource.into() }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AppError::CorruptStore {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Errors that must abort the current store operation instead of being
    /// folded into a report.
    pub fn is_fatal_store_error(&self) -> bool {
        matches!(self, AppError::CorruptStore { .. } | AppError::StoreBusy { .. })
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
