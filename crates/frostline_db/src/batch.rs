//! Transaction-sized batch loop shared by the copier and the exporter.
//!
//! A step moves at most `limit` rows per call, each call being its own transaction. The loop
//! stops after the first short batch, so 2,500 rows at a batch size of 1,000 run as
//! `[1000, 1000, 500]`.

use crate::error::{DbError, Result};
use async_trait::async_trait;
use tracing::debug;

/// Rows moved per batch, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    batches: Vec<u64>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, rows: u64) {
        self.batches.push(rows);
    }

    pub fn batches(&self) -> &[u64] {
        &self.batches
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn total_rows(&self) -> u64 {
        self.batches.iter().sum()
    }
}

/// One bounded unit of work.
#[async_trait]
pub trait BatchStep: Send {
    /// Move up to `limit` rows and return how many were moved.
    async fn next_batch(&mut self, limit: u64) -> Result<u64>;
}

/// Drive `step` until it returns fewer than `batch_size` rows.
pub async fn run_batches<S>(step: &mut S, batch_size: u64, label: &str) -> Result<BatchReport>
where
    S: BatchStep + ?Sized,
{
    if batch_size == 0 {
        return Err(DbError::invalid_state("batch size must be positive"));
    }

    let mut report = BatchReport::new();
    loop {
        let moved = step.next_batch(batch_size).await?;
        if moved > 0 {
            report.record(moved);
            debug!(
                label,
                batch = report.batch_count(),
                rows = moved,
                total = report.total_rows(),
                "Batch committed"
            );
        }
        if moved < batch_size {
            break;
        }
    }

    Ok(report)
}
