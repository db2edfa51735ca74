use frostline_db::DbError;
use frostline_protocol::{ConfigError, ValidationError};
use frostline_sinks::SinkError;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can end an archive run.
///
/// Collaborator errors are wrapped transparently so they surface exactly as raised.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Every cycle found a leftover staging table.
    #[error("table '{table}': staging table still present after {cycles} archive cycles")]
    CycleLimitExceeded { table: String, cycles: u32 },

    #[error("work directory {}: {source}", path.display())]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    /// Short machine-readable class, used in incident records.
    pub fn kind(&self) -> &'static str {
        match self {
            ArchiveError::Config(_) => "config",
            ArchiveError::Validation(_) => "validation",
            ArchiveError::Database(_) => "database",
            ArchiveError::Sink(_) => "upload",
            ArchiveError::CycleLimitExceeded { .. } => "cycle_limit",
            ArchiveError::WorkDir { .. } => "work_dir",
        }
    }
}
