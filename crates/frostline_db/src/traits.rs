//! Collaborator interfaces consumed by the archive orchestrator.
//!
//! These traits enable swapping the database backend (MySQL, in-memory fakes for tests) without
//! changing the orchestration code.

use crate::batch::BatchReport;
use crate::error::Result;
use async_trait::async_trait;
use frostline_protocol::{ColumnBounds, StagingTarget};
use std::path::Path;

/// Parameters for one batched copy out of the live table.
#[derive(Debug, Clone, Copy)]
pub struct CopyRequest<'a> {
    pub where_clause: &'a str,
    pub index_hint: Option<&'a str>,
    pub optimize: bool,
    /// Rows per transaction.
    pub batch_size: u64,
}

/// Schema/DDL operations on the archive database.
#[async_trait]
pub trait StagingCatalog: Send + Sync {
    /// Create `<db>_archive` if absent. Idempotent.
    async fn ensure_archive_database(&self, target: &StagingTarget) -> Result<()>;

    /// Create the staging table with the live table's schema.
    ///
    /// Fails with [`DbError::DuplicateTable`](crate::DbError::DuplicateTable) when it already
    /// exists.
    async fn create_staging_table(&self, target: &StagingTarget) -> Result<()>;

    async fn drop_staging_table(&self, target: &StagingTarget) -> Result<()>;

    async fn count_staged_rows(&self, target: &StagingTarget) -> Result<u64>;

    /// Min/max of `column` in the staging table. `None` when every value is NULL.
    async fn log_column_bounds(
        &self,
        target: &StagingTarget,
        column: &str,
    ) -> Result<Option<ColumnBounds>>;
}

/// Bulk copy of eligible live rows into the staging table.
#[async_trait]
pub trait RowCopier: Send + Sync {
    /// Copy rows matching `request.where_clause`, one transaction per batch.
    async fn copy_rows(&self, target: &StagingTarget, request: &CopyRequest<'_>)
        -> Result<BatchReport>;
}

/// Bulk export of staged rows to a local flat file.
#[async_trait]
pub trait RowExporter: Send + Sync {
    /// Write every staged row to `path`, reading `batch_size` rows at a time.
    async fn export_rows(
        &self,
        target: &StagingTarget,
        batch_size: u64,
        path: &Path,
    ) -> Result<BatchReport>;
}
