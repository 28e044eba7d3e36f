//! Buffered, chunked row persistence.
//!
//! Rows accumulate in memory and flush in bounded chunks. A failed chunk
//! is put back in front of the buffer with everything not yet attempted,
//! so a row handed to the writer is never dropped — it is either durably
//! appended or still queued for the next flush (including the final
//! interrupt-path flush).

use super::{OfferRow, Sink, SinkResult};
use std::collections::VecDeque;

pub struct BatchWriter<'a> {
    sink: &'a dyn Sink,
    buffer: VecDeque<OfferRow>,
    chunk_size: usize,
}

impl<'a> BatchWriter<'a> {
    pub fn new(sink: &'a dyn Sink, chunk_size: usize) -> Self {
        Self {
            sink,
            buffer: VecDeque::new(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Queue one row; flushes when the buffer reaches the chunk size.
    pub async fn queue(&mut self, row: OfferRow) -> SinkResult<()> {
        self.buffer.push_back(row);
        if self.buffer.len() >= self.chunk_size {
            return self.flush().await;
        }
        Ok(())
    }

    pub async fn queue_all(&mut self, rows: impl IntoIterator<Item = OfferRow>) -> SinkResult<()> {
        for row in rows {
            self.queue(row).await?;
        }
        Ok(())
    }

    /// Drain the buffer in chunks. On the first failed chunk, stop and
    /// re-queue the failed chunk ahead of the remaining rows.
    pub async fn flush(&mut self) -> SinkResult<()> {
        while !self.buffer.is_empty() {
            let take = self.buffer.len().min(self.chunk_size);
            let chunk: Vec<OfferRow> = self.buffer.drain(..take).collect();
            if let Err(e) = self.sink.append_rows(&chunk).await {
                tracing::warn!("append of {} rows failed, re-queueing: {e}", chunk.len());
                for row in chunk.into_iter().rev() {
                    self.buffer.push_front(row);
                }
                return Err(e);
            }
            tracing::debug!("appended chunk of {take} rows");
        }
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::memory::MemorySink;

    fn row(n: usize) -> OfferRow {
        OfferRow {
            holder: "Andrew".into(),
            last_four: "1234".into(),
            card_name: "Freedom Flex Card".into(),
            brand: format!("Merchant {n}"),
            discount: "10% cash back".into(),
            max_discount: String::new(),
            min_spend: "None".into(),
            date_added: "Jan 01, 2024".into(),
            expiration: String::new(),
            local: false,
        }
    }

    #[tokio::test]
    async fn test_flush_chunks_at_configured_size() {
        let sink = MemorySink::new();
        let mut writer = BatchWriter::new(&sink, 400);
        // queue() auto-flushes at the threshold, so the explicit flush
        // only sees the tail.
        writer.queue_all((0..900).map(row)).await.unwrap();
        writer.flush().await.unwrap();
        assert_eq!(sink.append_sizes(), vec![400, 400, 100]);
        assert_eq!(sink.rows().len(), 900);
        assert_eq!(writer.pending(), 0);
    }

    #[tokio::test]
    async fn test_failed_chunk_is_requeued_in_order() {
        let sink = MemorySink::new();
        sink.script_appends(&[true, false]);
        let mut writer = BatchWriter::new(&sink, 400);
        for n in 0..900 {
            writer.buffer.push_back(row(n));
        }

        assert!(writer.flush().await.is_err());
        // first chunk landed; the failed chunk and the tail stay queued
        assert_eq!(sink.rows().len(), 400);
        assert_eq!(writer.pending(), 500);

        writer.flush().await.unwrap();
        assert_eq!(sink.rows().len(), 900);
        let brands: Vec<String> = sink.offer_rows().iter().map(|r| r.brand.clone()).collect();
        let expected: Vec<String> = (0..900).map(|n| format!("Merchant {n}")).collect();
        assert_eq!(brands, expected);
    }

    #[tokio::test]
    async fn test_queue_flushes_at_threshold() {
        let sink = MemorySink::new();
        let mut writer = BatchWriter::new(&sink, 3);
        writer.queue(row(0)).await.unwrap();
        writer.queue(row(1)).await.unwrap();
        assert_eq!(sink.rows().len(), 0);
        writer.queue(row(2)).await.unwrap();
        assert_eq!(sink.rows().len(), 3);
        assert_eq!(writer.pending(), 0);
    }
}
