use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;
use validator::Validate;

use crate::models::{generate_id, same_price, ChangeType, PricePoint};
use crate::utils::error::{AppError, Result};

/// One tracked product page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UrlEntry {
    pub id: Uuid,
    pub group_id: Uuid,
    pub url: String,
    #[serde(default)]
    pub target_price: Option<f64>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub history: Vec<PricePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewUrlEntry {
    pub group_id: Uuid,
    #[validate(url(message = "URL must be absolute"))]
    pub url: String,
    #[validate(range(min = 0.0, message = "Target price must be non-negative"))]
    pub target_price: Option<f64>,
}

impl UrlEntry {
    /// Builds an entry from validated input. The URL is stored in normalized form.
    pub fn new(new_entry: NewUrlEntry) -> Result<Self> {
        new_entry.validate()?;
        validate_target_price(new_entry.target_price)?;
        Ok(Self {
            id: generate_id(),
            group_id: new_entry.group_id,
            url: normalize_url(&new_entry.url)?,
            target_price: new_entry.target_price,
            current_price: None,
            history: Vec::new(),
        })
    }

    pub fn is_on_target(&self) -> bool {
        match (self.current_price, self.target_price) {
            (Some(current), Some(target)) => current <= target,
            _ => false,
        }
    }

    pub fn last_observed_at(&self) -> Option<DateTime<Utc>> {
        self.history.last().map(|point| point.observed_at)
    }

    /// Records a successfully extracted price.
    ///
    /// A history point is appended when there was no previous price or the
    /// price moved in either direction; an unchanged price leaves the entry
    /// untouched. `observed_at` is clamped to the last recorded timestamp so
    /// history never goes back in time.
    pub fn record_price(&mut self, price: f64, observed_at: DateTime<Utc>) -> ChangeType {
        let change = match self.current_price {
            None => ChangeType::Initial,
            Some(current) if same_price(current, price) => ChangeType::Unchanged,
            Some(current) if price > current => ChangeType::Increased,
            Some(_) => ChangeType::Decreased,
        };

        if change.is_change() {
            let observed_at = match self.last_observed_at() {
                Some(last) if last > observed_at => last,
                _ => observed_at,
            };
            self.history.push(PricePoint::new(price, observed_at));
            self.current_price = Some(price);
        }

        change
    }
}

pub fn validate_target_price(target_price: Option<f64>) -> Result<()> {
    match target_price {
        Some(price) if !price.is_finite() || price < 0.0 => Err(AppError::Validation(format!(
            "Target price must be a non-negative number, got {}",
            price
        ))),
        _ => Ok(()),
    }
}

/// Parses and normalizes a tracked URL. Only http(s) URLs are accepted.
pub fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).map_err(|e| AppError::InvalidUrl {
        url: trimmed.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(AppError::InvalidUrl {
                url: trimmed.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            })
        }
    }

    if parsed.host_str().is_none() {
        return Err(AppError::InvalidUrl {
            url: trimmed.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(parsed.to_string())
}
