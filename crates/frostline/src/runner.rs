//! Runs a list of jobs in order, behind the incident-reporting boundary.

use crate::context::ArchiveContext;
use crate::error::ArchiveError;
use crate::orchestrator::{ArchiveOutcome, Archiver};
use crate::report::{capture, IncidentReporter};
use frostline_db::validate_predicate;
use frostline_protocol::{ArchiveJob, ValidationError};
use std::sync::Arc;
use tracing::info;

/// Outcomes of a completed run, in job order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub outcomes: Vec<ArchiveOutcome>,
}

impl RunSummary {
    pub fn archived_rows(&self) -> u64 {
        self.outcomes.iter().map(ArchiveOutcome::archived_rows).sum()
    }
}

/// Check every job before any of them touches a database.
pub fn validate_jobs(jobs: &[ArchiveJob]) -> Result<(), ValidationError> {
    if jobs.is_empty() {
        return Err(ValidationError::NoJobs);
    }
    for (index, job) in jobs.iter().enumerate() {
        job.validate(index)?;
        validate_predicate(&job.where_clause).map_err(|e| ValidationError::UnsafeWhereClause {
            table: job.table.clone(),
            reason: e.to_string(),
        })?;
        if let Some(hint) = job.index_hint.as_deref() {
            if hint.trim().is_empty() {
                return Err(ValidationError::MissingField {
                    index,
                    field: "index_hint",
                    table: job.table.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Sequential batch runner. The first failure stops the run.
pub struct Runner {
    ctx: ArchiveContext,
    reporter: Arc<dyn IncidentReporter>,
}

impl Runner {
    pub fn new(ctx: ArchiveContext, reporter: Arc<dyn IncidentReporter>) -> Self {
        Self { ctx, reporter }
    }

    pub fn context(&self) -> &ArchiveContext {
        &self.ctx
    }

    /// Validate all jobs, then archive them one after another.
    ///
    /// Any error is reported to the incident reporter and returned as is.
    pub async fn run_all(&self, jobs: &[ArchiveJob]) -> Result<RunSummary, ArchiveError> {
        capture(
            self.reporter.as_ref(),
            None,
            validate_jobs(jobs).map_err(ArchiveError::from),
        )?;

        let archiver = Archiver::new(&self.ctx);
        let mut summary = RunSummary::default();
        for (idx, job) in jobs.iter().enumerate() {
            info!(
                table = %job.table,
                job = idx + 1,
                of = jobs.len(),
                "Archiving table"
            );
            let outcome = capture(
                self.reporter.as_ref(),
                Some(&job.table),
                archiver.run_archive(job).await,
            )?;
            info!(
                table = %job.table,
                cycles = outcome.cycles,
                rows = outcome.archived_rows(),
                "Table archived"
            );
            summary.outcomes.push(outcome);
        }

        info!(
            jobs = summary.outcomes.len(),
            rows = summary.archived_rows(),
            "Archive run complete"
        );
        Ok(summary)
    }
}
