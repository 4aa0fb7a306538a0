//! Fallback for sites without a registered strategy.

use scraper::Html;

use super::parsing::{
    price_from_attr_containing, price_from_currency_token, price_from_embedded_state, price_from_json_ld,
    price_from_product_meta, price_from_selector, visible_text,
};
use super::{ExtractionFailure, ExtractionResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub price: f64,
    pub confidence: f32,
    pub source: &'static str,
}

type Finder = fn(&Html, &str) -> Option<f64>;

fn json_ld(document: &Html, _raw: &str) -> Option<f64> {
    price_from_json_ld(document)
}

fn product_meta(document: &Html, _raw: &str) -> Option<f64> {
    price_from_product_meta(document)
}

fn itemprop(document: &Html, _raw: &str) -> Option<f64> {
    price_from_selector(document, r#"[itemprop="price"]"#)
}

fn embedded_state(_document: &Html, raw: &str) -> Option<f64> {
    price_from_embedded_state(raw)
}

fn price_class(document: &Html, _raw: &str) -> Option<f64> {
    price_from_attr_containing(document, "class", "price")
}

fn price_id(document: &Html, _raw: &str) -> Option<f64> {
    price_from_attr_containing(document, "id", "price")
}

fn currency_token(document: &Html, _raw: &str) -> Option<f64> {
    price_from_currency_token(&visible_text(document))
}

/// Finders in descending confidence order.
const FINDERS: [(&str, f32, Finder); 7] = [
    ("json-ld", 0.95, json_ld),
    ("product-meta", 0.9, product_meta),
    ("itemprop", 0.85, itemprop),
    ("embedded-state", 0.75, embedded_state),
    ("price-class", 0.6, price_class),
    ("price-id", 0.6, price_id),
    ("currency-token", 0.5, currency_token),
];

/// First candidate whose confidence reaches `min_confidence`.
pub fn best_candidate(document: &Html, raw: &str, min_confidence: f32) -> Option<Candidate> {
    FINDERS
        .iter()
        .filter(|&&(_, confidence, _)| confidence >= min_confidence)
        .find_map(|&(source, confidence, finder)| {
            finder(document, raw).map(|price| Candidate {
                price,
                confidence,
                source,
            })
        })
}

pub fn extract(document: &Html, raw: &str, min_confidence: f32) -> ExtractionResult {
    match best_candidate(document, raw, min_confidence) {
        Some(candidate) => {
            tracing::debug!(
                "Generic extraction matched {} ({:.2}): {}",
                candidate.source,
                candidate.confidence,
                candidate.price
            );
            Ok(candidate.price)
        }
        None => Err(ExtractionFailure::no_price(format!(
            "no price candidate with confidence >= {:.2}",
            min_confidence
        ))),
    }
}
