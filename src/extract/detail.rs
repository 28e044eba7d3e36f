//! Detail-view readers.
//!
//! After a click navigates to an offer's detail view, these pull the raw
//! text sources the rules cascade over: the "Pay with" card marker, the
//! headline amount and limitations fields, and the long-form terms block.

use crate::browser::{truncate_chars, Dom};
use crate::finder;
use regex::Regex;

/// Cap on terms text read from the detail view.
const TERMS_MAX_CHARS: usize = 6000;

/// Card name and last four from the "Pay with <name> (...1234)" marker,
/// with body-text fallbacks. `default_name` is used when only the last
/// four can be recovered; `("<default>", "XXXX")` when nothing can.
pub async fn read_card_and_last4(dom: &dyn Dom, default_name: &str) -> (String, String) {
    let pay_with =
        Regex::new(r"^Pay with\s+(.*?)\s*\((?:\.\.\.)?(\d{4})\)").expect("pay-with regex is valid");
    for node in finder::detail_marker().find_visible(dom).await {
        if let Ok(text) = dom.text(node).await {
            if let Some(caps) = pay_with.captures(text.trim()) {
                return (format!("{} Card", caps[1].trim()), caps[2].to_string());
            }
        }
    }

    let body = dom.body_text(TERMS_MAX_CHARS).await.unwrap_or_default();
    let ending =
        Regex::new(r"(?i)(?:ending in|ending\s*\*)\s*(\d{4})").expect("ending-in regex is valid");
    if let Some(caps) = ending.captures(&body) {
        return (default_name.to_string(), caps[1].to_string());
    }
    let parens = Regex::new(r"\(\.\.\.(\d{4})\)").expect("parenthesized last4 regex is valid");
    if let Some(caps) = parens.captures(&body) {
        return (default_name.to_string(), caps[1].to_string());
    }

    (default_name.to_string(), "XXXX".to_string())
}

/// Headline discount amount and limitations text, empty when absent.
pub async fn read_header_fields(dom: &dyn Dom) -> (String, String) {
    let mut amount = String::new();
    let mut limit = String::new();
    if let Some(node) = finder::detail_amount().find_visible(dom).await.first() {
        amount = dom.text(*node).await.unwrap_or_default().trim().to_string();
    }
    if let Some(node) = finder::detail_limit().find_visible(dom).await.first() {
        limit = dom.text(*node).await.unwrap_or_default().trim().to_string();
    }
    (amount, limit)
}

/// Long-form terms text: the dedicated container when present, otherwise
/// the whole body, capped either way.
pub async fn read_terms_text(dom: &dyn Dom) -> String {
    let nodes = finder::detail_terms().find_visible(dom).await;
    if !nodes.is_empty() {
        let mut parts = Vec::new();
        for node in nodes {
            if let Ok(text) = dom.text(node).await {
                if !text.trim().is_empty() {
                    parts.push(text);
                }
            }
        }
        if !parts.is_empty() {
            let mut joined = parts.join("\n");
            truncate_chars(&mut joined, TERMS_MAX_CHARS);
            return joined;
        }
    }
    dom.body_text(TERMS_MAX_CHARS).await.unwrap_or_default()
}
