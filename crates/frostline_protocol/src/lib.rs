//! Shared vocabulary for Frostline.
//!
//! Everything the archiver components agree on lives here:
//! - [`ArchiveJob`]: one table to archive and how to select its rows
//! - [`StagingTarget`]: the live table and its `<db>_archive.<table>_archive` staging twin
//! - [`naming`]: deterministic local/remote names for extract artifacts
//! - [`config`]: the process-wide configuration loaded once at startup

pub mod config;
pub mod defaults;
pub mod error;
pub mod naming;
pub mod paths;
pub mod types;

pub use config::{
    CopyConfig, DatabaseConfig, FrostlineConfig, ReportingConfig, RetryPolicy, StorageConfig,
};
pub use error::{ConfigError, ValidationError};
pub use naming::{compute_names, where_descriptor, ArchiveNames};
pub use types::{ArchiveJob, ColumnBounds, StagingTarget};
