//! Building blocks shared by the strategies: number parsing, structured
//! product data and common price-bearing markup.

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::str::FromStr;
use std::sync::LazyLock;

use super::ExtractionFailure;

const NUMBER_PATTERN: &str = r"\d{1,3}(?:[ \x{A0}]\d{3})+(?:[.,]\d{1,2})?|\d{1,3}(?:\.\d{3})+,\d{1,2}|\d{1,3}(?:,\d{3})+\.\d{1,2}|\d+(?:[.,]\d+)?";

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(NUMBER_PATTERN).expect("valid number pattern"));

static CURRENCY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:\b(?:kr|sek)\.?\s*|[$€£]\s*)({num})|({num})\s*(?:kr\b|sek\b|:-|[$€£])",
        num = NUMBER_PATTERN
    ))
    .expect("valid currency pattern")
});

static NEXT_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<script[^>]*id="__NEXT_DATA__"[^>]*>(.+?)</script>"#).expect("valid next data pattern")
});

static STATE_ASSIGNMENTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?s)__NEXT_DATA__\s*=\s*(\{.+?\})\s*;?\s*</script>",
        r"(?s)__INITIAL_STATE__\s*=\s*(\{.+?\})\s*;?\s*</script>",
        r"(?s)window\.__PRELOADED_STATE__\s*=\s*(\{.+?\})\s*;?\s*</script>",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid state pattern"))
    .collect()
});

const PRICE_KEYS: [&str; 13] = [
    "price",
    "currentPrice",
    "sellingPrice",
    "salePrice",
    "priceValue",
    "unitPrice",
    "amount",
    "value",
    "priceAmount",
    "retailPrice",
    "displayPrice",
    "listPrice",
    "regularPrice",
];

const MAX_JSON_DEPTH: usize = 10;
const MAX_LIST_DEPTH: usize = 5;
const MAX_LIST_ITEMS: usize = 20;

pub fn parse_document(page_content: &str) -> Result<Html, ExtractionFailure> {
    if page_content.trim().is_empty() {
        return Err(ExtractionFailure::parse("document is empty"));
    }
    if page_content.contains('\0') {
        return Err(ExtractionFailure::parse("document is not text"));
    }
    Ok(Html::parse_document(page_content))
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Parses the first price-looking number in `text`.
///
/// Accepts Swedish and English formats: `1 299,00 kr`, `1.299,00`,
/// `$1,299.99`, `199:-`, `22.90`.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let token = NUMBER.find(text)?.as_str();
    parse_number_token(token)
}

fn parse_number_token(token: &str) -> Option<f64> {
    let compact: String = token.chars().filter(|c| !c.is_whitespace() && *c != '\u{A0}').collect();

    let normalized = match (compact.rfind(','), compact.rfind('.')) {
        // 1.299,00
        (Some(comma), Some(dot)) if comma > dot => compact.replace('.', "").replace(',', "."),
        // 1,299.99
        (Some(_), Some(_)) => compact.replace(',', ""),
        (Some(_), None) => compact.replace(',', "."),
        _ => compact,
    };

    let value = Decimal::from_str(&normalized).ok()?.to_f64()?;
    usable_price(value)
}

fn usable_price(value: f64) -> Option<f64> {
    if value.is_finite() && value > 0.0 {
        Some(value)
    } else {
        None
    }
}

pub fn value_to_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().and_then(usable_price),
        Value::String(s) => parse_price_text(s),
        _ => None,
    }
}

pub fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// Price from an element: the `content` attribute when present, else its text.
pub fn element_price(element: &ElementRef<'_>) -> Option<f64> {
    element
        .value()
        .attr("content")
        .and_then(parse_price_text)
        .or_else(|| parse_price_text(&element_text(element)))
}

/// `price` / `offers.price` / `offers[0].price` from JSON-LD product data.
pub fn price_from_json_ld(document: &Html) -> Option<f64> {
    let scripts = selector(r#"script[type="application/ld+json"]"#)?;
    for script in document.select(&scripts) {
        let raw: String = script.text().collect();
        let Ok(data) = serde_json::from_str::<Value>(raw.trim()) else {
            continue;
        };

        let items: Vec<&Value> = match &data {
            Value::Array(items) => items.iter().collect(),
            Value::Object(map) => match map.get("@graph") {
                Some(Value::Array(graph)) => std::iter::once(&data).chain(graph.iter()).collect(),
                _ => vec![&data],
            },
            _ => continue,
        };

        if let Some(price) = items.into_iter().find_map(price_from_json_ld_object) {
            return Some(price);
        }
    }
    None
}

fn price_from_json_ld_object(data: &Value) -> Option<f64> {
    if let Some(price) = data.get("price").and_then(value_to_price) {
        return Some(price);
    }

    match data.get("offers")? {
        Value::Object(offer) => offer.get("price").and_then(value_to_price),
        Value::Array(offers) => offers.first()?.get("price").and_then(value_to_price),
        _ => None,
    }
}

/// Price from embedded application state (`__NEXT_DATA__` and friends).
pub fn price_from_embedded_state(html: &str) -> Option<f64> {
    let from_next_data = NEXT_DATA
        .captures(html)
        .and_then(|captures| serde_json::from_str::<Value>(captures.get(1)?.as_str()).ok())
        .and_then(|data| find_price_in_json(&data, 0));
    if from_next_data.is_some() {
        return from_next_data;
    }

    STATE_ASSIGNMENTS.iter().find_map(|pattern| {
        let captures = pattern.captures(html)?;
        let data = serde_json::from_str::<Value>(captures.get(1)?.as_str()).ok()?;
        find_price_in_json(&data, 0)
    })
}

/// Depth-limited search for a well-known price key.
pub fn find_price_in_json(data: &Value, depth: usize) -> Option<f64> {
    if depth > MAX_JSON_DEPTH {
        return None;
    }
    let map = data.as_object()?;

    for key in PRICE_KEYS {
        let Some(value) = map.get(key) else {
            continue;
        };
        let found = match value {
            Value::Object(nested) => ["amount", "value", "price"]
                .iter()
                .find_map(|subkey| nested.get(*subkey).and_then(value_to_price)),
            other => value_to_price(other),
        };
        if found.is_some() {
            return found;
        }
    }

    for value in map.values() {
        let found = match value {
            Value::Object(_) => find_price_in_json(value, depth + 1),
            Value::Array(items) if depth < MAX_LIST_DEPTH => items
                .iter()
                .take(MAX_LIST_ITEMS)
                .filter(|item| item.is_object())
                .find_map(|item| find_price_in_json(item, depth + 1)),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }

    None
}

pub fn price_from_product_meta(document: &Html) -> Option<f64> {
    let meta = selector(r#"meta[property="product:price:amount"]"#)?;
    document
        .select(&meta)
        .find_map(|element| element.value().attr("content").and_then(parse_price_text))
}

pub fn price_from_selector(document: &Html, css: &str) -> Option<f64> {
    let sel = selector(css)?;
    document.select(&sel).find_map(|element| element_price(&element))
}

/// First parseable element whose `attr` contains `needle`, case-insensitive.
pub fn price_from_attr_containing(document: &Html, attr: &str, needle: &str) -> Option<f64> {
    let sel = selector(&format!("[{}]", attr))?;
    let needle = needle.to_lowercase();
    document
        .select(&sel)
        .filter(|element| {
            element
                .value()
                .attr(attr)
                .is_some_and(|value| value.to_lowercase().contains(&needle))
        })
        .filter(|element| !matches!(element.value().name(), "script" | "style" | "meta" | "link"))
        .find_map(|element| element_price(&element))
}

/// Visible text of the document, skipping scripts and styles.
pub fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(|parent| matches!(parent.value().name(), "script" | "style" | "noscript"));
        if !hidden && !text.trim().is_empty() {
            parts.push(text.trim().to_string());
        }
    }
    parts.join(" ")
}

/// First number in `text` carrying a currency marker before or after it.
pub fn price_from_currency_token(text: &str) -> Option<f64> {
    CURRENCY_TOKEN.captures_iter(text).find_map(|captures| {
        captures
            .get(1)
            .or_else(|| captures.get(2))
            .and_then(|token| parse_number_token(token.as_str()))
    })
}
