//! Collaborators and settings shared by every stage of an archive run.

use frostline_db::{RowCopier, RowExporter, StagingCatalog};
use frostline_protocol::defaults::DEFAULT_TRANSACTION_SIZE;
use frostline_protocol::{FrostlineConfig, RetryPolicy};
use frostline_sinks::ColdStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the orchestrator needs, built once at startup and passed down by reference.
#[derive(Clone)]
pub struct ArchiveContext {
    pub catalog: Arc<dyn StagingCatalog>,
    pub copier: Arc<dyn RowCopier>,
    pub exporter: Arc<dyn RowExporter>,
    pub store: Arc<dyn ColdStore>,
    /// Database holding the live tables.
    pub live_database: String,
    /// Directory for local extracts.
    pub work_dir: PathBuf,
    /// Default rows per transaction; jobs may override it.
    pub transaction_size: u64,
    pub retry: RetryPolicy,
}

impl ArchiveContext {
    /// Use one backend for the catalog, copier, and exporter.
    pub fn new<W, S>(warehouse: Arc<W>, store: Arc<S>, live_database: impl Into<String>) -> Self
    where
        W: StagingCatalog + RowCopier + RowExporter + 'static,
        S: ColdStore + 'static,
    {
        Self {
            catalog: warehouse.clone(),
            copier: warehouse.clone(),
            exporter: warehouse,
            store,
            live_database: live_database.into(),
            work_dir: std::env::temp_dir(),
            transaction_size: DEFAULT_TRANSACTION_SIZE,
            retry: RetryPolicy::default(),
        }
    }

    /// Apply the `[database]`, `[storage]`, and `[retry]` settings.
    pub fn configured(mut self, config: &FrostlineConfig) -> Self {
        self.live_database = config.database.database.clone();
        self.work_dir = config.storage.work_dir();
        self.transaction_size = config.database.transaction_size;
        self.retry = config.retry;
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_transaction_size(mut self, size: u64) -> Self {
        self.transaction_size = size;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl std::fmt::Debug for ArchiveContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveContext")
            .field("live_database", &self.live_database)
            .field("work_dir", &self.work_dir)
            .field("transaction_size", &self.transaction_size)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
