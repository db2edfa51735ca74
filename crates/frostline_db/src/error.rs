use crate::sql_guard::SqlGuardError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("MySQL error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("extract file error: {0}")]
    Io(#[from] std::io::Error),

    /// The staging table survived an earlier, interrupted cycle.
    #[error("staging table {database}.{table} already exists")]
    DuplicateTable { database: String, table: String },

    #[error("{0} not found")]
    NotFound(String),

    /// Unusable schema or batch parameters.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("where clause rejected: {0}")]
    UnsafeSql(#[from] SqlGuardError),
}

impl DbError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn duplicate_table(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self::DuplicateTable {
            database: database.into(),
            table: table.into(),
        }
    }

    /// True for the one conflict the orchestrator recovers from.
    pub fn is_duplicate_table(&self) -> bool {
        matches!(self, Self::DuplicateTable { .. })
    }
}
