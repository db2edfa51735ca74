//! Per-table archive state machine.
//!
//! Each cycle ensures the archive database, then tries to create the staging table:
//! - created: copy eligible rows in batches, drain them, done
//! - already exists: an earlier run was interrupted; drain the leftovers (named with an empty
//!   where clause), back off, and start the next cycle
//!
//! Any other error ends the job as raised. The loop runs at most `retry.max_cycles` times.

use crate::context::ArchiveContext;
use crate::error::ArchiveError;
use crate::pipeline::{DrainOutcome, Drainer};
use frostline_db::{BatchReport, CopyRequest};
use frostline_protocol::{ArchiveJob, StagingTarget};
use tracing::{info, warn};

/// What one job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOutcome {
    pub table: String,
    /// Cycles run, including the final one.
    pub cycles: u32,
    /// Drains of leftover staging tables, oldest first.
    pub recovered: Vec<DrainOutcome>,
    pub copied: BatchReport,
    pub drained: DrainOutcome,
}

impl ArchiveOutcome {
    /// Rows that reached cold storage during this job.
    pub fn archived_rows(&self) -> u64 {
        self.recovered.iter().map(DrainOutcome::rows).sum::<u64>() + self.drained.rows()
    }
}

/// Runs [`ArchiveJob`]s against one [`ArchiveContext`].
pub struct Archiver<'a> {
    ctx: &'a ArchiveContext,
}

impl<'a> Archiver<'a> {
    pub fn new(ctx: &'a ArchiveContext) -> Self {
        Self { ctx }
    }

    /// Archive one table. Assumes `job` has been validated.
    pub async fn run_archive(&self, job: &ArchiveJob) -> Result<ArchiveOutcome, ArchiveError> {
        let ctx = self.ctx;
        let target = StagingTarget::for_table(&ctx.live_database, &job.table);
        let batch_size = job.effective_transaction_size(ctx.transaction_size);
        let drainer = Drainer::new(ctx);
        let max_cycles = ctx.retry.max_cycles.max(1);
        let mut recovered = Vec::new();

        for cycle in 1..=max_cycles {
            ctx.catalog.ensure_archive_database(&target).await?;
            info!(
                table = %job.table,
                phase = "ensure_database",
                cycle,
                database = %target.archive_database,
                "Archive database ready"
            );

            match ctx.catalog.create_staging_table(&target).await {
                Ok(()) => {
                    info!(
                        table = %job.table,
                        phase = "create_staging",
                        cycle,
                        staging = %target.staging_qualified(),
                        "Staging table created"
                    );
                    let copied = self.copy(job, &target, batch_size).await?;
                    let drained = drainer
                        .drain(&target, &job.log_column, batch_size, &job.where_clause)
                        .await?;
                    return Ok(ArchiveOutcome {
                        table: job.table.clone(),
                        cycles: cycle,
                        recovered,
                        copied,
                        drained,
                    });
                }
                Err(err) if err.is_duplicate_table() => {
                    warn!(
                        table = %job.table,
                        phase = "recovered_conflict",
                        cycle,
                        staging = %target.staging_qualified(),
                        "Staging table left by an interrupted run; draining it first"
                    );
                    let drained = drainer.drain(&target, &job.log_column, batch_size, "").await?;
                    recovered.push(drained);

                    let delay = ctx.retry.backoff_for(cycle);
                    if cycle < max_cycles && !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ArchiveError::CycleLimitExceeded {
            table: job.table.clone(),
            cycles: max_cycles,
        })
    }

    async fn copy(
        &self,
        job: &ArchiveJob,
        target: &StagingTarget,
        batch_size: u64,
    ) -> Result<BatchReport, ArchiveError> {
        let request = CopyRequest {
            where_clause: &job.where_clause,
            index_hint: job.index_hint.as_deref(),
            optimize: job.optimize,
            batch_size,
        };
        let report = self.ctx.copier.copy_rows(target, &request).await?;
        for (idx, rows) in report.batches().iter().enumerate() {
            info!(
                table = %job.table,
                phase = "copy_batch",
                batch = idx + 1,
                rows,
                "Batch copied"
            );
        }
        Ok(report)
    }
}
