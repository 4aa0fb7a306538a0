//! jula.se product pages.
//!
//! Structured product data first (JSON-LD, then embedded state), then the
//! site's price markup in this order: `.price`, `.product-price`,
//! `[itemprop=price]`, any class containing "price", and finally the
//! `product:price:amount` meta tag.

use scraper::Html;

use super::parsing::{
    price_from_attr_containing, price_from_embedded_state, price_from_json_ld, price_from_product_meta,
    price_from_selector,
};
use super::{ExtractionFailure, ExtractionResult};

const PRICE_SELECTORS: [&str; 3] = [".price", ".product-price", r#"[itemprop="price"]"#];

pub fn extract(document: &Html, raw: &str) -> ExtractionResult {
    price_from_json_ld(document)
        .or_else(|| price_from_embedded_state(raw))
        .or_else(|| PRICE_SELECTORS.iter().find_map(|css| price_from_selector(document, css)))
        .or_else(|| price_from_attr_containing(document, "class", "price"))
        .or_else(|| price_from_product_meta(document))
        .ok_or_else(|| ExtractionFailure::no_price("no price in Jula product data or price markup"))
}
