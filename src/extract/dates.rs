//! Date parsing and normalization.
//!
//! Offer text carries dates in several absolute formats plus relative
//! "in N days" phrases. Everything normalizes to one canonical output
//! format; anything unparseable resolves to the empty string, never an
//! error. `today` is passed in explicitly so relative phrases are
//! deterministic under test.

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;

/// Canonical output format: `Jan 31, 2024`.
pub const CANONICAL_FORMAT: &str = "%b %d, %Y";

// `%y` first: chrono's `%Y` happily parses "3/5/24" as year 0024, so the
// two-digit form must win before the four-digit form gets a look. `%y`
// consumes exactly two digits, so four-digit years fall through to `%Y`.
const ABSOLUTE_FORMATS: [&str; 4] = ["%b %d, %Y", "%B %d, %Y", "%m/%d/%y", "%m/%d/%Y"];

/// Parse a date in any accepted textual form.
pub fn parse_date_any(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in ABSOLUTE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            // a sub-four-digit year means a misread input, not a real date
            if d.year() >= 1000 {
                return Some(d);
            }
        }
    }
    let rel = Regex::new(r"(?i)(\d+)\s+days").expect("relative-days regex is valid");
    if let Some(caps) = rel.captures(s) {
        let days: i64 = caps[1].parse().ok()?;
        return today.checked_add_signed(Duration::days(days));
    }
    None
}

/// Normalize to [`CANONICAL_FORMAT`], or empty string when unparseable.
pub fn normalize_date(s: &str, today: NaiveDate) -> String {
    parse_date_any(s, today)
        .map(|d| d.format(CANONICAL_FORMAT).to_string())
        .unwrap_or_default()
}

/// Today's date in the local timezone, canonical format.
pub fn today_canonical() -> String {
    chrono::Local::now()
        .date_naive()
        .format(CANONICAL_FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_absolute_formats() {
        let today = day(2024, 1, 1);
        assert_eq!(parse_date_any("Mar 05, 2024", today), Some(day(2024, 3, 5)));
        assert_eq!(
            parse_date_any("March 5, 2024", today),
            Some(day(2024, 3, 5))
        );
        assert_eq!(parse_date_any("3/5/2024", today), Some(day(2024, 3, 5)));
        assert_eq!(parse_date_any("03/05/24", today), Some(day(2024, 3, 5)));
    }

    #[test]
    fn test_two_digit_years_map_to_the_current_century() {
        let today = day(2024, 1, 1);
        assert_eq!(parse_date_any("3/5/24", today), Some(day(2024, 3, 5)));
        assert_eq!(parse_date_any("12/31/99", today), Some(day(1999, 12, 31)));
        assert_eq!(normalize_date("3/5/24", today), "Mar 05, 2024");
    }

    #[test]
    fn test_relative_days_converted_at_extraction_time() {
        let today = day(2024, 1, 1);
        assert_eq!(
            normalize_date("expires in 30 days", today),
            "Jan 31, 2024"
        );
    }

    #[test]
    fn test_unparseable_is_empty_never_error() {
        let today = day(2024, 1, 1);
        assert_eq!(normalize_date("", today), "");
        assert_eq!(normalize_date("soon", today), "");
        assert_eq!(normalize_date("13/45/2024", today), "");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let today = day(2024, 1, 1);
        let once = normalize_date("3/5/24", today);
        assert_eq!(once, "Mar 05, 2024");
        assert_eq!(normalize_date(&once, today), once);
    }
}
