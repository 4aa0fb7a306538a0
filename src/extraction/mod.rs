//! Price extraction: one closed set of strategies, picked per URL by the
//! dispatcher.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod dispatcher;
pub mod generic;
pub mod jula;
pub mod parsing;
pub mod willys;

pub use dispatcher::{resolve, SiteRegistration, REGISTRY};

/// Candidates below this confidence are ignored by the generic strategy.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    FetchFailed,
    ParseFailed,
    NoPriceFound,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::FetchFailed => "FetchFailed",
            FailureKind::ParseFailed => "ParseFailed",
            FailureKind::NoPriceFound => "NoPriceFound",
        };
        f.write_str(label)
    }
}

/// Typed per-URL failure. Never escapes the update run.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind}: {detail}")]
pub struct ExtractionFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl ExtractionFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn fetch(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::FetchFailed, detail)
    }

    pub fn parse(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::ParseFailed, detail)
    }

    pub fn no_price(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::NoPriceFound, detail)
    }
}

pub type ExtractionResult = Result<f64, ExtractionFailure>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Jula,
    Willys,
    Generic,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Jula => "jula",
            Strategy::Willys => "willys",
            Strategy::Generic => "generic",
        }
    }

    pub fn extract(&self, page_content: &str) -> ExtractionResult {
        self.extract_with_confidence(page_content, DEFAULT_MIN_CONFIDENCE)
    }

    /// Runs the strategy. `min_confidence` only affects the generic fallback;
    /// site rules are fixed.
    pub fn extract_with_confidence(&self, page_content: &str, min_confidence: f32) -> ExtractionResult {
        let document = parsing::parse_document(page_content)?;
        let price = match self {
            Strategy::Jula => jula::extract(&document, page_content),
            Strategy::Willys => willys::extract(&document, page_content),
            Strategy::Generic => generic::extract(&document, page_content, min_confidence),
        }?;

        if !price.is_finite() || price < 0.0 {
            return Err(ExtractionFailure::parse(format!(
                "{} strategy produced an invalid price {}",
                self.name(),
                price
            )));
        }
        Ok(price)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
