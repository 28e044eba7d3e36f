//! Persistence sink abstraction and the offer row model.
//!
//! The sink is the one external resource with independent failure and
//! latency behavior. The engine talks to it through the [`Sink`] trait and
//! never assumes an append succeeded — see [`writer::BatchWriter`].

pub mod memory;
pub mod sheets;
pub mod writer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed 10-column schema of the offers worksheet.
pub const OFFER_HEADERS: [&str; 10] = [
    "Card Holder",
    "Last Four",
    "Card Name",
    "Brand",
    "Discount",
    "Maximum Discount",
    "Minimum Spend",
    "Date Added",
    "Expiration",
    "Local",
];

/// Header schema of the log worksheet.
pub const LOG_HEADERS: [&str; 4] = ["Time", "Level", "Function", "Message"];

/// Zero-based columns holding date cells (Date Added, Expiration).
pub const DATE_COLUMNS: [usize; 2] = [7, 8];

/// Errors at the persistence boundary.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sink API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("sink schema error: {0}")]
    Schema(String),
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

pub type SinkResult<T> = Result<T, SinkError>;

/// One enrolled offer. Immutable once created by the enroll loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRow {
    pub holder: String,
    pub last_four: String,
    pub card_name: String,
    pub brand: String,
    pub discount: String,
    pub max_discount: String,
    pub min_spend: String,
    pub date_added: String,
    pub expiration: String,
    pub local: bool,
}

/// Identity used to suppress reprocessing within a run and across runs.
///
/// Canonical key: the (holder, last four, brand, discount) subset,
/// case-insensitive. Full-tuple equality is reserved for the post-run
/// exact-duplicate sweep, where rows differing only in dates are kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl OfferRow {
    pub fn dedup_key(&self) -> DedupKey {
        let joined = format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.holder, self.last_four, self.brand, self.discount
        );
        DedupKey(joined.to_lowercase())
    }

    /// Serialize to the sink's 10-cell form.
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.holder.clone(),
            self.last_four.clone(),
            self.card_name.clone(),
            self.brand.clone(),
            self.discount.clone(),
            self.max_discount.clone(),
            self.min_spend.clone(),
            self.date_added.clone(),
            self.expiration.clone(),
            if self.local { "Yes" } else { "No" }.to_string(),
        ]
    }

    /// Parse a sink row, tolerating short rows (missing trailing cells).
    pub fn from_cells(cells: &[String]) -> Self {
        let get = |i: usize| cells.get(i).cloned().unwrap_or_default();
        Self {
            holder: get(0),
            last_four: get(1),
            card_name: get(2),
            brand: get(3),
            discount: get(4),
            max_discount: get(5),
            min_spend: get(6),
            date_added: get(7),
            expiration: get(8),
            local: get(9).eq_ignore_ascii_case("yes"),
        }
    }
}

/// External persistent tabular store receiving offer rows.
///
/// Row/column indices are zero-based over data rows; the header row is
/// managed by `ensure_headers` and excluded from `read_all`.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Append rows to the offers worksheet. Must verify the append.
    async fn append_rows(&self, rows: &[OfferRow]) -> SinkResult<()>;
    /// Read all data rows (raw cells, header excluded).
    async fn read_all(&self) -> SinkResult<Vec<Vec<String>>>;
    /// Update one cell of a data row.
    async fn update_cell(&self, row: usize, col: usize, value: &str) -> SinkResult<()>;
    /// Delete a contiguous range of data rows `[start, end)`.
    async fn delete_rows(&self, start: usize, end: usize) -> SinkResult<()>;
    /// Clear and re-set the display filter over the first `rows` data rows.
    async fn reset_filter(&self, rows: usize) -> SinkResult<()>;
    /// Enforce/repair the header rows of both worksheets.
    async fn ensure_headers(&self) -> SinkResult<()>;
    /// Append a row to the remote log worksheet.
    async fn append_log(&self, level: &str, func: &str, msg: &str) -> SinkResult<()>;
}

/// Log to the sink's log worksheet, degrading to a local warn on failure.
pub async fn sink_log(sink: &dyn Sink, level: &str, func: &str, msg: &str) {
    if let Err(e) = sink.append_log(level, func, msg).await {
        tracing::warn!("remote log failed ({level} {func}: {msg}): {e}");
    }
}
