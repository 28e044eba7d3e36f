//! Multi-strategy element lookup, tolerant to markup drift.
//!
//! A [`Locator`] is a prioritized list of independent [`Probe`]s for the
//! same logical target. Dashboard markup changes between releases; the
//! probes here cover the attribute, test-id, and role/structure variants
//! observed so far. Lookup never errors: a native failure on one probe
//! just means "try the next strategy".

use crate::browser::{Dom, NodeId, Probe};

/// A named, ordered collection of probes for one logical target.
#[derive(Debug, Clone)]
pub struct Locator {
    pub name: &'static str,
    pub probes: Vec<Probe>,
}

impl Locator {
    pub fn new(name: &'static str, probes: Vec<Probe>) -> Self {
        Self { name, probes }
    }

    /// Union the matches of every probe, filtered to visible elements.
    ///
    /// Returns an empty vec — never an error — when nothing matches.
    /// Callers treat emptiness as "no more work" only after several
    /// consecutive empty polls (see the enroll loop's idle counting).
    pub async fn find_visible(&self, dom: &dyn Dom) -> Vec<NodeId> {
        let mut out = Vec::new();
        for probe in &self.probes {
            let nodes = match dom.query(probe).await {
                Ok(nodes) => nodes,
                Err(e) => {
                    tracing::debug!("locator {}: probe failed, trying next: {e}", self.name);
                    continue;
                }
            };
            for node in nodes {
                if out.contains(&node) {
                    continue;
                }
                if dom.is_visible(node).await.unwrap_or(false) {
                    out.push(node);
                }
            }
        }
        out
    }

    /// Evaluate probes in priority order, returning the first probe's
    /// visible matches. Used for readiness shells where any one structural
    /// probe is sufficient.
    pub async fn find_first(&self, dom: &dyn Dom) -> Vec<NodeId> {
        for probe in &self.probes {
            let nodes = match dom.query(probe).await {
                Ok(nodes) => nodes,
                Err(_) => continue,
            };
            let mut visible = Vec::new();
            for node in nodes {
                if dom.is_visible(node).await.unwrap_or(false) {
                    visible.push(node);
                }
            }
            if !visible.is_empty() {
                return visible;
            }
        }
        Vec::new()
    }

    /// Whether any probe currently matches a visible element.
    pub async fn present(&self, dom: &dyn Dom) -> bool {
        !self.find_first(dom).await.is_empty()
    }
}

// ── Well-known targets ───────────────────────────────────────────────────────

/// The actionable "add offer" controls on the categories page.
pub fn add_offer_buttons() -> Locator {
    Locator::new(
        "add-offer-button",
        vec![
            Probe::css("button[aria-label*='Add offer']"),
            Probe::css("[data-testid='addOfferButton']"),
            Probe::css("mds-icon[data-testid='commerce-tile-button']"),
            Probe::css("button[aria-label^='Add ']"),
        ],
    )
}

/// Structural shell of the offer hub (card selector present).
pub fn hub_shell() -> Locator {
    Locator::new(
        "hub-shell",
        vec![
            Probe::css("button#select-select-credit-card-account"),
            Probe::css("[data-testid='select-credit-card-account']"),
            Probe::css("#select-credit-card-account"),
        ],
    )
}

/// Structural shell of the categories page, including its loading skeleton
/// (a skeleton still means the route resolved).
pub fn categories_shell() -> Locator {
    Locator::new(
        "categories-shell",
        vec![
            Probe::css("[data-testid='offerCategoriesPage']"),
            Probe::text("h1", "offers for you"),
            Probe::css("[data-testid='loading-indicator']"),
            Probe::css("[class*='skeleton']"),
        ],
    )
}

/// The "Pay with <card> (...1234)" marker on an offer detail view.
pub fn detail_marker() -> Locator {
    Locator::new("detail-marker", vec![Probe::text("span", "Pay with")])
}

/// In-place "added to card" marker on a tile.
pub fn added_marker() -> Locator {
    Locator::new(
        "added-marker",
        vec![
            Probe::text("span", "added to card"),
            Probe::text("div", "added to card"),
        ],
    )
}

/// Long-form terms/disclaimer container on the detail view.
pub fn detail_terms() -> Locator {
    Locator::new(
        "detail-terms",
        vec![
            Probe::css("[data-testid='offer-detail-text-and-disclaimer-link-container-id']"),
            Probe::css("[data-cy='offer-detail-text-and-disclaimer-link-container']"),
        ],
    )
}

/// Headline discount amount on the detail view.
pub fn detail_amount() -> Locator {
    Locator::new(
        "detail-amount",
        vec![Probe::css("[data-testid='offerAmount']")],
    )
}

/// Limitations/fine-print field on the detail view.
pub fn detail_limit() -> Locator {
    Locator::new(
        "detail-limit",
        vec![Probe::css("[data-testid='limitations']")],
    )
}

/// Brand/merchant name hooks on the detail view.
pub fn brand_hooks() -> Locator {
    Locator::new(
        "brand-hooks",
        vec![
            Probe::css("[data-testid='merchantName']"),
            Probe::css("[data-testid='brandName']"),
            Probe::css("div[class*='merchant'] span"),
            Probe::css("div[class*='brand'] span"),
        ],
    )
}

/// Heading elements, used as the last brand fallback.
pub fn headings() -> Locator {
    Locator::new(
        "headings",
        vec![Probe::css("h1, h2, h3, [role='heading']")],
    )
}

/// The transient "unable to enroll" dialog.
pub fn enroll_error_dialog() -> Locator {
    Locator::new(
        "enroll-error-dialog",
        vec![
            Probe::text("[role='dialog']", "unable to enroll"),
            Probe::text("[class*='modal']", "unable to enroll"),
        ],
    )
}

/// Close/dismiss control inside a dialog.
pub fn dialog_close() -> Locator {
    Locator::new(
        "dialog-close",
        vec![
            Probe::css("[role='dialog'] button[aria-label='Close']"),
            Probe::css("[role='dialog'] button[aria-label='Dismiss']"),
            Probe::text("[role='dialog'] button", "close"),
        ],
    )
}

/// "Show more" / "Load more" expanders above the offer grid.
pub fn show_more() -> Locator {
    Locator::new(
        "show-more",
        vec![
            Probe::text("button", "show more"),
            Probe::text("button", "load more"),
            Probe::text("a", "see all offers"),
        ],
    )
}

/// Link back into the categories page, used as a last navigation nudge.
pub fn categories_link() -> Locator {
    Locator::new(
        "categories-link",
        vec![Probe::css("a[href*='offerCategoriesPage']")],
    )
}

/// Username input on the issuer home-page login widget.
pub fn home_username_input() -> Locator {
    Locator::new(
        "home-username-input",
        vec![
            Probe::css("#userId-text-input-field"),
            Probe::css("input[data-validate='userId']"),
            Probe::css("input[name='userId']"),
        ],
    )
}

/// Password input on the issuer home-page login widget.
pub fn home_password_input() -> Locator {
    Locator::new(
        "home-password-input",
        vec![
            Probe::css("#password-text-input-field"),
            Probe::css("input[type='password'][name='password']"),
        ],
    )
}

/// Step-up authentication password input.
pub fn mfa_password_input() -> Locator {
    Locator::new(
        "mfa-password-input",
        vec![
            Probe::css("#password_input-input-field"),
            Probe::css("input[type='password']"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDom;

    #[tokio::test]
    async fn test_find_visible_unions_and_filters() {
        let dom = FakeDom::new();
        dom.push_tile("Coffee Shop\n10% cash back", "Coffee Shop");
        dom.push_tile("Hidden Deal\n5% off", "Hidden Deal");
        dom.hide_tile(1);

        let found = add_offer_buttons().find_visible(&dom).await;
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_match_is_not_an_error() {
        let dom = FakeDom::new();
        let found = add_offer_buttons().find_visible(&dom).await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_find_first_stops_at_first_probe_with_matches() {
        let dom = FakeDom::new();
        dom.push_tile("Tile\n$5 off", "Tile");
        let found = add_offer_buttons().find_first(&dom).await;
        assert_eq!(found.len(), 1);
    }
}
