//! information_schema lookups.

use crate::error::{DbError, Result};
use sqlx::mysql::MySqlPool;

/// One column and its `information_schema` `DATA_TYPE` (lowercase, e.g. `varchar`, `json`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Column {
    pub name: String,
    pub data_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into().to_ascii_lowercase(),
        }
    }

    /// JSON columns reject binary-charset input (ER 3144), so they travel as utf8mb4 text.
    fn is_json(&self) -> bool {
        self.data_type == "json"
    }

    /// Types whose comparison follows a collation rather than byte order.
    fn is_collated(&self) -> bool {
        matches!(
            self.data_type.as_str(),
            "char"
                | "varchar"
                | "tinytext"
                | "text"
                | "mediumtext"
                | "longtext"
                | "enum"
                | "set"
        )
    }

    /// Expression read back for this column.
    pub fn select_expr(&self) -> String {
        let quoted = crate::quote_ident(&self.name);
        if self.is_json() {
            format!("CAST({} AS CHAR)", quoted)
        } else {
            format!("CAST({} AS BINARY)", quoted)
        }
    }

    /// Placeholder that accepts the bytes produced by [`Column::select_expr`].
    pub fn insert_placeholder(&self) -> &'static str {
        if self.is_json() {
            "CONVERT(? USING utf8mb4)"
        } else {
            "?"
        }
    }

    /// Expression for keyset paging; matches the byte comparison of the bound cursor value.
    pub fn cursor_expr(&self) -> String {
        let quoted = crate::quote_ident(&self.name);
        if self.is_collated() {
            format!("CAST({} AS BINARY)", quoted)
        } else {
            quoted
        }
    }
}

/// Columns in ordinal order.
pub(crate) async fn table_columns(
    pool: &MySqlPool,
    database: &str,
    table: &str,
) -> Result<Vec<Column>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT CAST(COLUMN_NAME AS CHAR), CAST(DATA_TYPE AS CHAR) \
         FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION",
    )
    .bind(database)
    .bind(table)
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        return Err(DbError::not_found(format!("table {}.{}", database, table)));
    }
    Ok(rows
        .into_iter()
        .map(|(name, data_type)| Column::new(name, data_type))
        .collect())
}

/// Primary key column names in key order. Empty when the table has no primary key.
pub(crate) async fn primary_key_columns(
    pool: &MySqlPool,
    database: &str,
    table: &str,
) -> Result<Vec<String>> {
    let columns: Vec<String> = sqlx::query_scalar(
        "SELECT CAST(COLUMN_NAME AS CHAR) FROM information_schema.KEY_COLUMN_USAGE \
         WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY' \
         ORDER BY ORDINAL_POSITION",
    )
    .bind(database)
    .bind(table)
    .fetch_all(pool)
    .await?;
    Ok(columns)
}

/// Positions of `key` within `columns`.
pub(crate) fn key_positions(columns: &[Column], key: &[String]) -> Result<Vec<usize>> {
    key.iter()
        .map(|k| {
            columns.iter().position(|c| &c.name == k).ok_or_else(|| {
                DbError::invalid_state(format!("primary key column {} not in column list", k))
            })
        })
        .collect()
}

/// Every value travels as raw bytes; JSON as utf8mb4 text.
pub(crate) fn select_list(columns: &[Column]) -> String {
    columns
        .iter()
        .map(Column::select_expr)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `` `a` `` for one column, `` (`a`, `b`) `` for several.
pub(crate) fn key_tuple(key: &[String]) -> String {
    let quoted: Vec<String> = key.iter().map(|k| crate::quote_ident(k)).collect();
    if quoted.len() == 1 {
        quoted[0].clone()
    } else {
        format!("({})", quoted.join(", "))
    }
}

/// `?` for one column, `(?, ?)` for several.
pub(crate) fn placeholder_tuple(width: usize) -> String {
    if width == 1 {
        "?".to_string()
    } else {
        format!("({})", vec!["?"; width].join(", "))
    }
}
