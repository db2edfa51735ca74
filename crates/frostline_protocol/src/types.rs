//! Core archive job and staging identity types.

use crate::defaults::{ARCHIVE_SUFFIX, DEFAULT_TRANSACTION_SIZE};
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One table to archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveJob {
    /// Live table name.
    #[serde(default)]
    pub table: String,
    /// Predicate selecting rows eligible for archival.
    #[serde(default, rename = "where")]
    pub where_clause: String,
    /// Column whose min/max values are recorded in the artifact name.
    #[serde(default, alias = "column_to_add_in_s3_filename")]
    pub log_column: String,
    /// Index the copier should scan (`FORCE INDEX`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_hint: Option<String>,
    /// Run `OPTIMIZE TABLE` on the live table after copying.
    #[serde(default)]
    pub optimize: bool,
    /// Per-job override of the database-level transaction size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_size: Option<u64>,
}

impl ArchiveJob {
    pub fn new(
        table: impl Into<String>,
        where_clause: impl Into<String>,
        log_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            where_clause: where_clause.into(),
            log_column: log_column.into(),
            index_hint: None,
            optimize: false,
            transaction_size: None,
        }
    }

    pub fn with_index_hint(mut self, hint: impl Into<String>) -> Self {
        self.index_hint = Some(hint.into());
        self
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_transaction_size(mut self, size: u64) -> Self {
        self.transaction_size = Some(size);
        self
    }

    /// Check required fields. `index` is the job's position in its batch, used in messages.
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        let required: [(&'static str, &str); 3] = [
            ("table", &self.table),
            ("where", &self.where_clause),
            ("log_column", &self.log_column),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField {
                    index,
                    field,
                    table: self.table.clone(),
                });
            }
        }
        if self.transaction_size == Some(0) {
            return Err(ValidationError::ZeroTransactionSize {
                table: self.table.clone(),
            });
        }
        Ok(())
    }

    /// Transaction size for this job, falling back to the database-level default.
    pub fn effective_transaction_size(&self, default: u64) -> u64 {
        match self.transaction_size {
            Some(size) if size > 0 => size,
            _ if default > 0 => default,
            _ => DEFAULT_TRANSACTION_SIZE,
        }
    }
}

/// A live table paired with its staging table in the archive database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagingTarget {
    pub live_database: String,
    pub table: String,
    pub archive_database: String,
    pub archive_table: String,
}

impl StagingTarget {
    /// `<db>_archive.<table>_archive` for the given live table.
    pub fn for_table(live_database: &str, table: &str) -> Self {
        Self {
            live_database: live_database.to_string(),
            table: table.to_string(),
            archive_database: format!("{}{}", live_database, ARCHIVE_SUFFIX),
            archive_table: format!("{}{}", table, ARCHIVE_SUFFIX),
        }
    }

    pub fn live_qualified(&self) -> String {
        format!("{}.{}", self.live_database, self.table)
    }

    pub fn staging_qualified(&self) -> String {
        format!("{}.{}", self.archive_database, self.archive_table)
    }
}

impl fmt::Display for StagingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.live_qualified(), self.staging_qualified())
    }
}

/// Observed min/max of the log column, rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnBounds {
    pub min: String,
    pub max: String,
}

impl ColumnBounds {
    pub fn new(min: impl Into<String>, max: impl Into<String>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }
}
