use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod group;
pub mod url_entry;
pub mod price_history;

// Re-exports for convenience
pub use group::*;
pub use url_entry::*;
pub use price_history::*;

/// Outcome of recording a freshly extracted price on an entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// First price ever recorded for the entry.
    Initial,
    Increased,
    Decreased,
    Unchanged,
}

impl ChangeType {
    pub fn is_change(&self) -> bool {
        !matches!(self, ChangeType::Unchanged)
    }
}

/// Prices closer than this are treated as equal.
pub const PRICE_EPSILON: f64 = 1e-9;

pub fn same_price(a: f64, b: f64) -> bool {
    (a - b).abs() < PRICE_EPSILON
}

pub fn generate_id() -> Uuid {
    Uuid::new_v4()
}
