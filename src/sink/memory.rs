//! In-memory [`Sink`] for tests.

use super::{OfferRow, Sink, SinkError, SinkResult, LOG_HEADERS, OFFER_HEADERS};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOp {
    Append(usize),
    UpdateCell { row: usize, col: usize, value: String },
    DeleteRows { start: usize, end: usize },
    ResetFilter(usize),
    EnsureHeaders,
}

#[derive(Default)]
struct Inner {
    rows: Vec<Vec<String>>,
    logs: Vec<[String; 3]>,
    ops: Vec<SinkOp>,
    fail_appends: VecDeque<bool>,
    headers_ensured: bool,
}

/// Records every operation and supports per-call append failure injection.
#[derive(Default)]
pub struct MemorySink {
    inner: Mutex<Inner>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed pre-existing data rows (raw cells).
    pub fn seed_rows(&self, rows: Vec<Vec<String>>) {
        self.inner.lock().unwrap().rows = rows;
    }

    /// Script the outcome of upcoming `append_rows` calls in order; calls
    /// beyond the script succeed.
    pub fn script_appends(&self, outcomes: &[bool]) {
        self.inner.lock().unwrap().fail_appends = outcomes.iter().map(|ok| !ok).collect();
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.inner.lock().unwrap().rows.clone()
    }

    pub fn offer_rows(&self) -> Vec<OfferRow> {
        self.inner
            .lock()
            .unwrap()
            .rows
            .iter()
            .map(|cells| OfferRow::from_cells(cells))
            .collect()
    }

    pub fn logs(&self) -> Vec<[String; 3]> {
        self.inner.lock().unwrap().logs.clone()
    }

    pub fn ops(&self) -> Vec<SinkOp> {
        self.inner.lock().unwrap().ops.clone()
    }

    /// Sizes of successful appends, in call order.
    pub fn append_sizes(&self) -> Vec<usize> {
        self.inner
            .lock()
            .unwrap()
            .ops
            .iter()
            .filter_map(|op| match op {
                SinkOp::Append(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    pub fn headers_ensured(&self) -> bool {
        self.inner.lock().unwrap().headers_ensured
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn append_rows(&self, rows: &[OfferRow]) -> SinkResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_appends.pop_front() == Some(true) {
            return Err(SinkError::Unavailable("scripted append failure".into()));
        }
        for row in rows {
            let cells = row.to_cells();
            debug_assert_eq!(cells.len(), OFFER_HEADERS.len());
            inner.rows.push(cells);
        }
        inner.ops.push(SinkOp::Append(rows.len()));
        Ok(())
    }

    async fn read_all(&self) -> SinkResult<Vec<Vec<String>>> {
        Ok(self.inner.lock().unwrap().rows.clone())
    }

    async fn update_cell(&self, row: usize, col: usize, value: &str) -> SinkResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let cells = inner
            .rows
            .get_mut(row)
            .ok_or_else(|| SinkError::Schema(format!("row {row} out of range")))?;
        if cells.len() <= col {
            cells.resize(col + 1, String::new());
        }
        cells[col] = value.to_string();
        inner.ops.push(SinkOp::UpdateCell {
            row,
            col,
            value: value.to_string(),
        });
        Ok(())
    }

    async fn delete_rows(&self, start: usize, end: usize) -> SinkResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if start > end || end > inner.rows.len() {
            return Err(SinkError::Schema(format!(
                "delete range {start}..{end} out of bounds"
            )));
        }
        inner.rows.drain(start..end);
        inner.ops.push(SinkOp::DeleteRows { start, end });
        Ok(())
    }

    async fn reset_filter(&self, rows: usize) -> SinkResult<()> {
        self.inner.lock().unwrap().ops.push(SinkOp::ResetFilter(rows));
        Ok(())
    }

    async fn ensure_headers(&self) -> SinkResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.headers_ensured = true;
        inner.ops.push(SinkOp::EnsureHeaders);
        Ok(())
    }

    async fn append_log(&self, level: &str, func: &str, msg: &str) -> SinkResult<()> {
        let mut inner = self.inner.lock().unwrap();
        debug_assert_eq!(LOG_HEADERS.len(), 4);
        inner
            .logs
            .push([level.to_string(), func.to_string(), msg.to_string()]);
        Ok(())
    }
}
