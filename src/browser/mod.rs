//! Browser/DOM abstraction.
//!
//! The engine treats the rendered page as an unstable external surface and
//! talks to it only through the [`Dom`] trait. Every call is fallible;
//! callers resolve failures to "try the next strategy" rather than
//! propagating them (the enroll trigger is the single mutating call).

pub mod chromium;

pub use chromium::escape_js;

use anyhow::Result;
use async_trait::async_trait;

/// Opaque handle to a page element, valid until the next navigation.
pub type NodeId = u64;

/// A single lookup strategy over the live DOM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// Plain CSS selector match.
    Css(String),
    /// CSS selector narrowed to elements whose visible text contains a
    /// fragment (case-insensitive). Stands in for the XPath `contains()`
    /// probes the dashboard markup otherwise requires.
    Text { css: String, contains: String },
}

impl Probe {
    pub fn css(selector: &str) -> Self {
        Probe::Css(selector.to_string())
    }

    pub fn text(selector: &str, contains: &str) -> Self {
        Probe::Text {
            css: selector.to_string(),
            contains: contains.to_string(),
        }
    }
}

/// The rendered page, queried repeatedly by a single actor.
#[async_trait]
pub trait Dom: Send + Sync {
    /// Direct navigation to a URL.
    async fn navigate(&self, url: &str) -> Result<()>;
    /// Script-based navigation fallback (`window.location.replace`).
    async fn navigate_script(&self, url: &str) -> Result<()>;
    /// Change only the SPA hash route, which is more reliable than a full
    /// reload once the dashboard shell is mounted.
    async fn set_hash_route(&self, route: &str) -> Result<()>;
    /// Current page URL.
    async fn current_url(&self) -> Result<String>;

    /// Evaluate one probe, returning handles for every match.
    async fn query(&self, probe: &Probe) -> Result<Vec<NodeId>>;
    /// Whether the element is currently rendered and visible.
    async fn is_visible(&self, node: NodeId) -> Result<bool>;
    /// Visible text of the element.
    async fn text(&self, node: NodeId) -> Result<String>;
    /// Visible text of the ancestor block (tile) containing the element.
    async fn tile_text(&self, node: NodeId) -> Result<String>;
    /// Text of the first heading inside the element's tile, if any.
    async fn tile_heading(&self, node: NodeId) -> Result<Option<String>>;

    /// Scroll the element into view and click it (or its nearest button
    /// ancestor). Returns whether the click was dispatched.
    async fn click(&self, node: NodeId) -> Result<bool>;
    /// Hide the element so later queries skip it.
    async fn hide(&self, node: NodeId) -> Result<()>;
    /// Type text into the element one character at a time, then dispatch
    /// synthetic input/change events so framework bindings register it.
    async fn type_text(&self, node: NodeId, text: &str) -> Result<()>;
    /// Current value of an input element.
    async fn input_value(&self, node: NodeId) -> Result<String>;

    /// Evaluate an arbitrary script, expecting a string result.
    async fn eval_string(&self, script: &str) -> Result<String>;
    /// Visible text of the whole document body, capped at `max_chars`.
    async fn body_text(&self, max_chars: usize) -> Result<String>;
    /// Scroll the page in steps to coax lazy-rendered content.
    async fn scroll_through(&self) -> Result<()>;
    /// Navigate back in history (prefers a Back control when present).
    async fn back(&self) -> Result<()>;
}

/// Truncate a string to at most `max_chars` characters.
///
/// `String::truncate` takes a byte index and panics off a char boundary,
/// so page text (which is routinely multi-byte) must be capped by char
/// count instead.
pub fn truncate_chars(s: &mut String, max_chars: usize) {
    if let Some((idx, _)) = s.char_indices().nth(max_chars) {
        s.truncate(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_counts_chars_not_bytes() {
        let mut s = "é".repeat(10);
        truncate_chars(&mut s, 4);
        assert_eq!(s, "éééé");

        let mut s = String::from("abc");
        truncate_chars(&mut s, 10);
        assert_eq!(s, "abc");
    }
}
