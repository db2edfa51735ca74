//! Frostline: moves aging rows out of live MySQL tables into compressed cold storage.
//!
//! For each configured table:
//! 1. eligible rows are copied in bounded transactions into `<db>_archive.<table>_archive`
//! 2. the staging table is exported to a TSV extract and gzipped
//! 3. the extract is uploaded to the object store
//! 4. only then are the local files and the staging table removed
//!
//! A staging table found at startup belongs to an interrupted run and is drained before any new
//! rows are copied.
//!
//! ```rust,ignore
//! let ctx = ArchiveContext::new(warehouse, store, "shop").configured(&config);
//! let runner = Runner::new(ctx, Arc::new(TracingReporter));
//! let summary = runner.run_all(&config.jobs).await?;
//! ```

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod runner;

pub use context::ArchiveContext;
pub use error::ArchiveError;
pub use orchestrator::{ArchiveOutcome, Archiver};
pub use pipeline::{DrainOutcome, Drainer};
pub use report::{
    capture, load_config, Incident, IncidentReporter, JsonlReporter, Reporters,
    TracingReporter,
};
pub use runner::{validate_jobs, RunSummary, Runner};
