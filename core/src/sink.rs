//! Where hourly summaries go once an hour has been simulated.

use crate::{error::SimResult, summary_store::SummaryStore, types::HourlySummary};

pub const DEFAULT_BATCH_SIZE: usize = 25;

pub trait SummarySink {
    /// Accept one summary. Called once per hour, in timestamp order, after
    /// every mutation for that hour has been applied.
    fn write(&mut self, summary: &HourlySummary) -> SimResult<()>;

    /// Push out anything still buffered.
    fn flush(&mut self) -> SimResult<()> {
        Ok(())
    }
}

/// Discards everything. For runs that only need the in-memory output.
#[derive(Debug, Default)]
pub struct NullSink;

impl SummarySink for NullSink {
    fn write(&mut self, _summary: &HourlySummary) -> SimResult<()> {
        Ok(())
    }
}

/// Writes to a [`SummaryStore`] in batches, preserving arrival order.
pub struct StoreSink<S: SummaryStore> {
    store:      S,
    pending:    Vec<HourlySummary>,
    batch_size: usize,
    written:    usize,
}

impl<S: SummaryStore> StoreSink<S> {
    pub fn new(store: S) -> Self {
        Self::with_batch_size(store, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(store: S, batch_size: usize) -> Self {
        Self {
            store,
            pending: Vec::with_capacity(batch_size.max(1)),
            batch_size: batch_size.max(1),
            written: 0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Rows confirmed by the store so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl<S: SummaryStore> SummarySink for StoreSink<S> {
    fn write(&mut self, summary: &HourlySummary) -> SimResult<()> {
        self.pending.push(summary.clone());
        if self.pending.len() >= self.batch_size {
            if let Err(e) = self.flush() {
                // The failed hour is rolled back by the engine; drop it here too.
                self.pending.pop();
                return Err(e);
            }
        }
        Ok(())
    }

    /// On failure the batch stays pending; retrying is the caller's call.
    fn flush(&mut self) -> SimResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.store.put_batch(&self.pending)?;
        self.written += self.pending.len();
        log::debug!("summary sink: flushed {} rows ({} total)", self.pending.len(), self.written);
        self.pending.clear();
        Ok(())
    }
}
