//! Pure text-extraction rules.
//!
//! Each rule is an independent function from text to an optional value;
//! a field resolves by running its rules first-match-wins against each
//! source in priority order. Unmatched fields resolve to a defined
//! sentinel, never an error. No distinction is made between "absent" and
//! "zero" — both land on the sentinel.

use crate::extract::dates;
use chrono::NaiveDate;
use regex::Regex;

/// A single extraction rule over free text.
pub type Rule = fn(&str) -> Option<String>;

/// Run rules in order against one text, returning the first match.
pub fn first_match(rules: &[Rule], text: &str) -> Option<String> {
    rules.iter().find_map(|rule| rule(text))
}

/// Run rules against each source in priority order; the whole rule list is
/// exhausted on one source before falling through to the next.
pub fn resolve<'a>(rules: &[Rule], sources: impl IntoIterator<Item = &'a str>) -> Option<String> {
    sources
        .into_iter()
        .filter(|s| !s.is_empty())
        .find_map(|s| first_match(rules, s))
}

// ── Discount ─────────────────────────────────────────────────────────────────

pub const DISCOUNT_FALLBACK: &str = "Unknown";

fn currency_cash_back(text: &str) -> Option<String> {
    let re = Regex::new(r"(?i)\$\d[\d,]*(?:\.\d{2})?\s*cash\s*back")
        .expect("currency cash back regex is valid");
    re.find(text).map(|m| m.as_str().trim().to_string())
}

fn currency_off(text: &str) -> Option<String> {
    let re =
        Regex::new(r"(?i)\$\d[\d,]*(?:\.\d{2})?\s*off").expect("currency off regex is valid");
    re.find(text).map(|m| m.as_str().trim().to_string())
}

fn percent_cash_back(text: &str) -> Option<String> {
    let re = Regex::new(r"(?i)\d{1,3}%\s*cash\s*back").expect("percent cash back regex is valid");
    re.find(text).map(|m| m.as_str().trim().to_string())
}

fn percent_off(text: &str) -> Option<String> {
    let re = Regex::new(r"(?i)\d{1,3}%\s*off").expect("percent off regex is valid");
    re.find(text).map(|m| m.as_str().trim().to_string())
}

pub fn discount_rules() -> Vec<Rule> {
    vec![currency_cash_back, currency_off, percent_cash_back, percent_off]
}

/// Resolve the discount across sources, falling back to `"Unknown"`.
pub fn resolve_discount<'a>(sources: impl IntoIterator<Item = &'a str>) -> String {
    resolve(&discount_rules(), sources).unwrap_or_else(|| DISCOUNT_FALLBACK.to_string())
}

// ── Maximum discount ─────────────────────────────────────────────────────────

fn currency_before_max(text: &str) -> Option<String> {
    let re = Regex::new(r"(?i)\$\s?([\d,]+(?:\.\d{2})?)\s*(?:cash\s*back\s*)?(?:maximum|max)\b")
        .expect("currency-before-max regex is valid");
    re.captures(text).map(|c| format!("${}", &c[1]))
}

fn max_before_currency(text: &str) -> Option<String> {
    let re = Regex::new(r"(?i)max(?:imum)?[^$]{0,25}\$(\d[\d,]*(?:\.\d{2})?)")
        .expect("max-before-currency regex is valid");
    re.captures(text).map(|c| format!("${}", &c[1]))
}

pub fn max_discount_rules() -> Vec<Rule> {
    vec![currency_before_max, max_before_currency]
}

/// Resolve the maximum discount, falling back to empty.
pub fn resolve_max_discount<'a>(sources: impl IntoIterator<Item = &'a str>) -> String {
    resolve(&max_discount_rules(), sources).unwrap_or_default()
}

// ── Minimum spend ────────────────────────────────────────────────────────────

pub const MIN_SPEND_FALLBACK: &str = "None";

fn currency_near_spend(text: &str) -> Option<String> {
    let re = Regex::new(r"(?i)(?:spend|purchase)[^$]{0,25}\$(\d[\d,]*(?:\.\d{2})?)")
        .expect("spend regex is valid");
    re.captures(text).map(|c| format!("${}", &c[1]))
}

fn any_currency(text: &str) -> Option<String> {
    let re = Regex::new(r"\$(\d[\d,]*(?:\.\d{2})?)").expect("currency regex is valid");
    re.captures(text).map(|c| format!("${}", &c[1]))
}

/// Resolve the minimum spend: keyword match in the terms, else any currency
/// amount in the header-limit text, else the `"None"` sentinel.
pub fn resolve_min_spend(terms: &str, header_limit: &str) -> String {
    currency_near_spend(terms)
        .or_else(|| any_currency(header_limit))
        .unwrap_or_else(|| MIN_SPEND_FALLBACK.to_string())
}

// ── Expiration ───────────────────────────────────────────────────────────────

/// Extract and normalize an expiration date from terms text.
pub fn resolve_expiration(text: &str, today: NaiveDate) -> String {
    let absolute = Regex::new(
        r"(?i)(?:expires?|offer expires|exp\.)\s*(?:on\s*)?([A-Za-z]{3,9}\s+\d{1,2},\s*\d{2,4}|\d{1,2}/\d{1,2}/\d{2,4})",
    )
    .expect("absolute expiration regex is valid");
    if let Some(caps) = absolute.captures(text) {
        let normalized = dates::normalize_date(&caps[1], today);
        if !normalized.is_empty() {
            return normalized;
        }
    }
    let relative =
        Regex::new(r"(?i)expires?\s+in\s+\d+\s+days").expect("relative expiration regex is valid");
    if let Some(m) = relative.find(text) {
        return dates::normalize_date(m.as_str(), today);
    }
    String::new()
}

// ── Local flag ───────────────────────────────────────────────────────────────

/// Disclaimer phrase marking a location-restricted offer.
fn has_location_disclaimer(text: &str) -> bool {
    let re = Regex::new(r"(?i)offer only applies to the following location")
        .expect("disclaimer regex is valid");
    re.is_match(text)
}

/// Address-shaped text: street number + street, then "City, ST 12345".
fn has_address_shape(text: &str) -> bool {
    let re = Regex::new(r"\n\d{2,5}\s+.+\n[A-Za-z\s]+,\s*[A-Z]{2}\s+\d{5}")
        .expect("address regex is valid");
    re.is_match(text)
}

/// Short-circuit OR of the two independent heuristics.
pub fn resolve_local(text: &str) -> bool {
    has_location_disclaimer(text) || has_address_shape(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan1() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_discount_rule_order() {
        // Currency rules win over percent rules when both are present.
        let text = "Earn 5% cash back, up to $12 cash back total";
        assert_eq!(resolve_discount([text]), "$12 cash back");
        assert_eq!(resolve_discount(["Get 15% off your order"]), "15% off");
        assert_eq!(resolve_discount(["Save $20 off $100"]), "$20 off");
    }

    #[test]
    fn test_discount_source_priority() {
        let tile = "no deal text here";
        let header = "10% cash back";
        assert_eq!(resolve_discount([tile, header]), "10% cash back");
    }

    #[test]
    fn test_discount_fallback_is_unknown() {
        assert_eq!(resolve_discount(["nothing to see"]), "Unknown");
        assert_eq!(resolve_discount([]), "Unknown");
    }

    #[test]
    fn test_max_discount_both_orders() {
        assert_eq!(
            resolve_max_discount(["$25 cash back maximum on this offer"]),
            "$25"
        );
        assert_eq!(resolve_max_discount(["Maximum discount of $18.50"]), "$18.50");
        assert_eq!(resolve_max_discount(["no cap mentioned"]), "");
    }

    #[test]
    fn test_min_spend_keyword_then_header_then_sentinel() {
        assert_eq!(resolve_min_spend("when you spend $50 or more", ""), "$50");
        assert_eq!(
            resolve_min_spend("on any single purchase of $9.99", ""),
            "$9.99"
        );
        assert_eq!(resolve_min_spend("no keyword", "$30 minimum"), "$30");
        assert_eq!(resolve_min_spend("no keyword", "no number"), "None");
        assert_eq!(resolve_min_spend("", ""), "None");
    }

    #[test]
    fn test_expiration_absolute_and_relative() {
        assert_eq!(
            resolve_expiration("Offer expires Mar 5, 2024.", jan1()),
            "Mar 05, 2024"
        );
        assert_eq!(
            resolve_expiration("Expires on 3/5/2024", jan1()),
            "Mar 05, 2024"
        );
        assert_eq!(
            resolve_expiration("This offer expires in 30 days", jan1()),
            "Jan 31, 2024"
        );
    }

    #[test]
    fn test_expiration_unparseable_is_empty() {
        assert_eq!(resolve_expiration("valid until further notice", jan1()), "");
        assert_eq!(resolve_expiration("", jan1()), "");
    }

    #[test]
    fn test_local_disclaimer_or_address() {
        assert!(resolve_local(
            "Offer only applies to the following location."
        ));
        assert!(resolve_local("Visit us:\n123 Main St\nSpringfield, IL 62704"));
        assert!(!resolve_local("Valid at all locations nationwide."));
    }
}
