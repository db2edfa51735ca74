//! Error types for job validation and configuration loading.

use std::path::PathBuf;
use thiserror::Error;

/// A job or setting rejected before any database interaction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("job #{index}: missing required field '{field}' (table: {table:?})")]
    MissingField {
        index: usize,
        field: &'static str,
        table: String,
    },

    #[error("job '{table}': transaction size must be positive")]
    ZeroTransactionSize { table: String },

    #[error("job '{table}': unsafe where clause: {reason}")]
    UnsafeWhereClause { table: String, reason: String },

    #[error("no archive jobs configured")]
    NoJobs,
}

/// Failure to load or interpret the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}
