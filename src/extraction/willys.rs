//! willys.se product pages.
//!
//! Willys renders the price split over sibling spans:
//! `<span>22</span><span>90</span><span>/st</span>`. We find the unit marker,
//! walk up to five ancestors, and join the first plausible pair of leaf-span
//! numbers as `whole.decimal`. Structured data and generic price markup are
//! fallbacks.

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use super::parsing::{
    element_text, price_from_attr_containing, price_from_embedded_state, price_from_json_ld,
    price_from_product_meta, price_from_selector,
};
use super::{ExtractionFailure, ExtractionResult};

static SPAN: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span").expect("static selector"));

const UNIT_MARKERS: [&str; 3] = ["/st", "/kg", "/l"];
const MAX_ANCESTOR_LEVELS: usize = 5;
const MIN_PRICE: f64 = 1.0;
const MAX_PRICE: f64 = 10_000.0;

const FALLBACK_SELECTORS: [&str; 3] = [
    r#"[data-testid="product-price"]"#,
    ".product-price",
    r#"[itemprop="price"]"#,
];

pub fn extract(document: &Html, raw: &str) -> ExtractionResult {
    split_price(document)
        .or_else(|| price_from_json_ld(document))
        .or_else(|| price_from_embedded_state(raw))
        .or_else(|| price_from_attr_containing(document, "class", "price"))
        .or_else(|| FALLBACK_SELECTORS.iter().find_map(|css| price_from_selector(document, css)))
        .or_else(|| price_from_product_meta(document))
        .ok_or_else(|| ExtractionFailure::no_price("no split price, product data or price markup on Willys page"))
}

fn split_price(document: &Html) -> Option<f64> {
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if !text.contains("/st") {
            continue;
        }

        let mut ancestor = node.parent();
        for _ in 0..MAX_ANCESTOR_LEVELS {
            let Some(current) = ancestor else {
                break;
            };
            if let Some(container) = ElementRef::wrap(current) {
                if let Some(price) = price_from_parts(&price_parts(&container)) {
                    return Some(price);
                }
            }
            ancestor = current.parent();
        }
    }
    None
}

/// 1-4 digit texts of leaf spans under `container`, in document order.
fn price_parts(container: &ElementRef<'_>) -> Vec<String> {
    container
        .select(&SPAN)
        .filter(|span| {
            !span
                .descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .any(|child| child.value().name() == "span")
        })
        .map(|span| element_text(&span))
        .filter(|text| !UNIT_MARKERS.iter().any(|marker| text.contains(marker)))
        .filter(|text| (1..=4).contains(&text.len()) && text.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

fn price_from_parts(parts: &[String]) -> Option<f64> {
    if parts.len() < 2 {
        return None;
    }
    parts.windows(2).find_map(|pair| {
        let (whole, decimals) = (&pair[0], &pair[1]);
        if whole == "0" || whole == "00" {
            return None;
        }
        let price: f64 = format!("{}.{}", whole, decimals).parse().ok()?;
        (MIN_PRICE..MAX_PRICE).contains(&price).then_some(price)
    })
}
