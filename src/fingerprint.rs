//! Tile fingerprints and dedup ledgers.
//!
//! Two distinct identities live here. A [`fingerprint`] is the normalized
//! text of a rendered tile, scoped to one pass: it stops the loop from
//! re-attempting a still-visible, already-handled element. A
//! [`DedupLedger`] tracks completed row keys across the run, seeded from
//! the sink and extended in memory as rows are produced.

use crate::sink::{DedupKey, OfferRow};
use std::collections::HashSet;

/// Maximum fingerprint length, in chars, after whitespace normalization.
const FINGERPRINT_CAP: usize = 200;

/// Whitespace-normalized, length-capped text identity of a tile.
pub fn fingerprint(tile_text: &str) -> String {
    let mut out = String::with_capacity(FINGERPRINT_CAP);
    let mut kept = 0;
    let mut last_space = true;
    for ch in tile_text.chars() {
        let ch = if ch.is_whitespace() { ' ' } else { ch };
        if ch == ' ' && last_space {
            continue;
        }
        last_space = ch == ' ';
        out.push(ch);
        kept += 1;
        if kept >= FINGERPRINT_CAP {
            break;
        }
    }
    out.trim_end().to_string()
}

/// Tiles already attempted within the current pass.
///
/// A tile whose click fails is still marked attempted: fail closed and
/// move on rather than retry a stuck element forever.
#[derive(Debug, Default)]
pub struct PassLedger {
    attempted: HashSet<String>,
}

impl PassLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a fingerprint attempted. Returns `false` if it already was.
    pub fn mark(&mut self, fp: &str) -> bool {
        self.attempted.insert(fp.to_string())
    }

    pub fn contains(&self, fp: &str) -> bool {
        self.attempted.contains(fp)
    }

    pub fn len(&self) -> usize {
        self.attempted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempted.is_empty()
    }
}

/// Completed row keys: the sink-loaded baseline plus in-run additions.
#[derive(Debug, Default)]
pub struct DedupLedger {
    keys: HashSet<DedupKey>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the ledger from rows already present in the sink.
    pub fn load_baseline<'a>(&mut self, rows: impl IntoIterator<Item = &'a OfferRow>) {
        for row in rows {
            self.keys.insert(row.dedup_key());
        }
    }

    /// Record a produced row. Returns `false` when the key was already
    /// known, i.e. the row must not be queued.
    pub fn insert(&mut self, row: &OfferRow) -> bool {
        self.keys.insert(row.dedup_key())
    }

    pub fn contains(&self, row: &OfferRow) -> bool {
        self.keys.contains(&row.dedup_key())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_normalizes_whitespace() {
        assert_eq!(
            fingerprint("  Coffee \n\n Shop\t 10%   cash back  "),
            "Coffee Shop 10% cash back"
        );
    }

    #[test]
    fn test_fingerprint_caps_length() {
        let long = "x".repeat(1000);
        assert_eq!(fingerprint(&long).len(), 200);
    }

    #[test]
    fn test_fingerprint_cap_counts_chars_not_bytes() {
        let long = "é".repeat(1000);
        assert_eq!(fingerprint(&long).chars().count(), 200);
    }

    #[test]
    fn test_pass_ledger_marks_once() {
        let mut ledger = PassLedger::new();
        assert!(ledger.mark("fp-a"));
        assert!(!ledger.mark("fp-a"));
        assert!(ledger.contains("fp-a"));
        assert!(!ledger.contains("fp-b"));
    }

    #[test]
    fn test_dedup_ledger_baseline_plus_in_run() {
        let existing = OfferRow {
            holder: "A".into(),
            last_four: "1111".into(),
            card_name: "Card".into(),
            brand: "Brand".into(),
            discount: "5% off".into(),
            max_discount: String::new(),
            min_spend: "None".into(),
            date_added: "Jan 01, 2024".into(),
            expiration: String::new(),
            local: false,
        };
        let mut ledger = DedupLedger::new();
        ledger.load_baseline([&existing]);
        assert!(ledger.contains(&existing));
        assert!(!ledger.insert(&existing));

        let mut fresh = existing.clone();
        fresh.brand = "Other".into();
        assert!(!ledger.contains(&fresh));
        assert!(ledger.insert(&fresh));
        assert!(!ledger.insert(&fresh));
    }
}
