//! Brand extraction heuristics.
//!
//! Resolution order: DOM proximity to the "added to card" marker, then
//! known attribute hooks, then nearby heading text, then the tile's own
//! heading guess, and finally the `"Unknown Brand"` sentinel. Every
//! candidate is rejected if it looks like a price or percentage — a brand
//! is never a discount string.

use crate::browser::Dom;
use crate::finder;
use regex::Regex;

pub const BRAND_FALLBACK: &str = "Unknown Brand";

/// Maximum plausible length of a brand name.
const MAX_BRAND_LEN: usize = 60;

/// Walks previous siblings of the "added to card" marker looking for the
/// short text block naming the merchant.
const PROXIMITY_JS: &str = r#"(() => {
    const added = Array.from(document.querySelectorAll('*'))
        .find(e => /added to card/i.test(e.textContent || ''));
    if (added) {
        let p = added.previousElementSibling;
        while (p) {
            const t = (p.innerText || '').trim();
            if (t && t.length <= 80) return t;
            p = p.previousElementSibling;
        }
    }
    return '';
})()"#;

/// Whether a candidate reads like a discount rather than a brand.
pub fn looks_like_price(text: &str) -> bool {
    let re = Regex::new(r"(?i)cash\s*back|\$\d|\d{1,3}\s*%").expect("price guard regex is valid");
    re.is_match(text)
}

/// Whether a heading is a plausible brand name.
pub fn plausible_brand(text: &str) -> bool {
    let t = text.trim();
    if t.len() < 2 || t.len() > MAX_BRAND_LEN {
        return false;
    }
    if looks_like_price(t) {
        return false;
    }
    let boilerplate =
        Regex::new(r"(?i)about this deal|offer details|expires").expect("boilerplate regex is valid");
    !boilerplate.is_match(t)
}

/// Resolve the brand on the current view.
pub async fn extract_brand(dom: &dyn Dom, tile_guess: &str) -> String {
    // 1. DOM proximity to the "added" marker.
    if let Ok(candidate) = dom.eval_string(PROXIMITY_JS).await {
        let candidate = candidate.trim();
        if !candidate.is_empty() && plausible_brand(candidate) {
            return candidate.to_string();
        }
    }

    // 2. Known attribute hooks.
    for node in finder::brand_hooks().find_visible(dom).await {
        if let Ok(text) = dom.text(node).await {
            let text = text.trim();
            if !text.is_empty() && plausible_brand(text) {
                return text.to_string();
            }
        }
    }

    // 3. Nearby headings, bounded scan.
    for node in finder::headings().find_visible(dom).await.into_iter().take(6) {
        if let Ok(text) = dom.text(node).await {
            let text = text.trim();
            if plausible_brand(text) {
                return text.to_string();
            }
        }
    }

    // 4. Tile guess, 5. constant sentinel.
    let guess = tile_guess.trim();
    if !guess.is_empty() && !looks_like_price(guess) {
        return guess.to_string();
    }
    BRAND_FALLBACK.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDom;

    #[test]
    fn test_price_guard() {
        assert!(looks_like_price("$5 off"));
        assert!(looks_like_price("10% cash back"));
        assert!(looks_like_price("Up to 15 % back"));
        assert!(!looks_like_price("Blue Bottle Coffee"));
    }

    #[test]
    fn test_plausible_brand_bounds_and_boilerplate() {
        assert!(plausible_brand("Blue Bottle Coffee"));
        assert!(!plausible_brand("X"));
        assert!(!plausible_brand(&"y".repeat(61)));
        assert!(!plausible_brand("About this deal"));
        assert!(!plausible_brand("Expires Mar 5, 2024"));
    }

    #[tokio::test]
    async fn test_pure_fallback_returns_exact_sentinel() {
        let dom = FakeDom::new();
        assert_eq!(extract_brand(&dom, "").await, "Unknown Brand");
        // A price-shaped tile guess must not leak through.
        assert_eq!(extract_brand(&dom, "10% cash back").await, "Unknown Brand");
    }

    #[tokio::test]
    async fn test_tile_guess_used_when_dom_is_silent() {
        let dom = FakeDom::new();
        assert_eq!(extract_brand(&dom, "Corner Bakery").await, "Corner Bakery");
    }
}
