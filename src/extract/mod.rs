//! Text extraction pipeline.
//!
//! Turns the unstructured text of tiles and detail views into the fixed
//! offer-row fields. Sources are tried in a fixed priority order; each
//! field resolves through a cascade of pattern rules and never hard-fails
//! (see [`rules`]). Dates normalize to one canonical format ([`dates`]);
//! brands go through layered DOM heuristics ([`brand`]).

pub mod brand;
pub mod dates;
pub mod detail;
pub mod rules;

use crate::browser::Dom;
use crate::sink::OfferRow;
use chrono::NaiveDate;

/// Text captured from a tile before its enroll control is clicked.
#[derive(Debug, Clone, Default)]
pub struct TileFacts {
    /// Full visible tile text.
    pub text: String,
    /// First heading inside the tile, the cheapest brand guess.
    pub brand_guess: String,
}

impl TileFacts {
    /// Discount parsed from the tile alone.
    pub fn discount(&self) -> Option<String> {
        rules::first_match(&rules::discount_rules(), &self.text)
    }
}

/// Build a row from the rich detail view after a navigating click.
pub async fn row_from_detail(
    dom: &dyn Dom,
    holder: &str,
    default_card_name: &str,
    tile: &TileFacts,
    today: NaiveDate,
) -> OfferRow {
    let (header_amount, header_limit) = detail::read_header_fields(dom).await;
    let (card_name, last_four) = detail::read_card_and_last4(dom, default_card_name).await;
    let terms = detail::read_terms_text(dom).await;

    let discount = rules::resolve_discount([
        header_amount.as_str(),
        tile.text.as_str(),
        terms.as_str(),
    ]);
    let brand = brand::extract_brand(dom, &tile.brand_guess).await;

    OfferRow {
        holder: holder.to_string(),
        last_four,
        card_name,
        brand,
        discount,
        max_discount: rules::resolve_max_discount([terms.as_str()]),
        min_spend: rules::resolve_min_spend(&terms, &header_limit),
        date_added: today.format(dates::CANONICAL_FORMAT).to_string(),
        expiration: rules::resolve_expiration(&terms, today),
        local: rules::resolve_local(&terms),
    }
}

/// Build a minimal row from tile text alone, for the in-place "added"
/// path and the best-effort timeout path.
pub async fn row_from_tile(
    dom: &dyn Dom,
    holder: &str,
    default_card_name: &str,
    tile: &TileFacts,
    today: NaiveDate,
) -> OfferRow {
    let discount = tile
        .discount()
        .unwrap_or_else(|| rules::DISCOUNT_FALLBACK.to_string());
    let brand = if !tile.brand_guess.trim().is_empty()
        && !brand::looks_like_price(&tile.brand_guess)
    {
        tile.brand_guess.trim().to_string()
    } else {
        brand::extract_brand(dom, &tile.brand_guess).await
    };

    OfferRow {
        holder: holder.to_string(),
        last_four: "XXXX".to_string(),
        card_name: default_card_name.to_string(),
        brand,
        discount,
        max_discount: String::new(),
        min_spend: rules::MIN_SPEND_FALLBACK.to_string(),
        date_added: today.format(dates::CANONICAL_FORMAT).to_string(),
        expiration: String::new(),
        local: false,
    }
}
