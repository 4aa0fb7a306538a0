use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

impl PricePoint {
    pub fn new(price: f64, observed_at: DateTime<Utc>) -> Self {
        Self { price, observed_at }
    }
}

/// Returns the first index at which `history` goes back in time, if any.
pub fn first_out_of_order(history: &[PricePoint]) -> Option<usize> {
    history
        .windows(2)
        .position(|pair| pair[1].observed_at < pair[0].observed_at)
        .map(|i| i + 1)
}
