//! Batched live → staging copy.
//!
//! Each batch:
//! 1. opens a live-side transaction and selects up to `limit` eligible rows, locking them when
//!    they will be deleted
//! 2. inserts them into the staging table in an archive-side transaction and commits it
//! 3. deletes them from the live table and commits the live-side transaction
//!
//! The staging insert commits before the live delete, so a crash between the two leaves the
//! rows in both places (archived twice later) and never in neither.

use super::schema::{
    key_positions, key_tuple, placeholder_tuple, primary_key_columns, select_list, table_columns,
    Column,
};
use super::MySqlWarehouse;
use crate::batch::{run_batches, BatchReport, BatchStep};
use crate::error::{DbError, Result};
use crate::sql_guard::{qualified, quote_ident, validate_predicate};
use crate::traits::{CopyRequest, RowCopier};
use async_trait::async_trait;
use frostline_protocol::StagingTarget;
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::Row;
use tracing::info;

/// Keep each multi-row statement under MySQL's 65,535 placeholder limit.
const MAX_PLACEHOLDERS: usize = 60_000;

type RowValues = Vec<Option<Vec<u8>>>;

#[async_trait]
impl RowCopier for MySqlWarehouse {
    async fn copy_rows(
        &self,
        target: &StagingTarget,
        request: &CopyRequest<'_>,
    ) -> Result<BatchReport> {
        validate_predicate(request.where_clause)?;

        let columns = table_columns(&self.live, &target.live_database, &target.table).await?;
        let key = primary_key_columns(&self.live, &target.live_database, &target.table).await?;
        if key.is_empty() {
            return Err(DbError::invalid_state(format!(
                "{} has no primary key; batched copy needs one",
                target.live_qualified()
            )));
        }
        let key_idx = key_positions(&columns, &key)?;

        let mut step = CopyStep {
            live: &self.live,
            archive: &self.archive,
            target,
            columns,
            key,
            key_idx,
            where_clause: request.where_clause,
            index_hint: request.index_hint,
            delete_from_source: self.delete_from_source,
            cursor: None,
        };
        let report = run_batches(&mut step, request.batch_size, &target.table).await?;

        info!(
            table = %target.live_qualified(),
            staging = %target.staging_qualified(),
            rows = report.total_rows(),
            batches = report.batch_count(),
            deleted_from_source = self.delete_from_source,
            "Copy finished"
        );

        if request.optimize && self.delete_from_source && report.total_rows() > 0 {
            let sql = format!(
                "OPTIMIZE TABLE {}",
                qualified(&target.live_database, &target.table)
            );
            sqlx::raw_sql(&sql).execute(&self.live).await?;
            info!(table = %target.live_qualified(), "Live table optimized");
        }

        Ok(report)
    }
}

struct CopyStep<'a> {
    live: &'a MySqlPool,
    archive: &'a MySqlPool,
    target: &'a StagingTarget,
    columns: Vec<Column>,
    key: Vec<String>,
    key_idx: Vec<usize>,
    where_clause: &'a str,
    index_hint: Option<&'a str>,
    delete_from_source: bool,
    /// Last key copied; only used in copy-only mode, where rows stay behind.
    cursor: Option<RowValues>,
}

impl CopyStep<'_> {
    /// Key expressions to page by. Copy-only mode compares the cursor bytewise, so it orders the
    /// same way.
    fn paging_key(&self) -> Vec<String> {
        if self.delete_from_source {
            self.key.iter().map(|k| quote_ident(k)).collect()
        } else {
            self.key_idx
                .iter()
                .map(|&i| self.columns[i].cursor_expr())
                .collect()
        }
    }

    fn select_sql(&self, limit: u64) -> String {
        let mut sql = format!(
            "SELECT {} FROM {}",
            select_list(&self.columns),
            qualified(&self.target.live_database, &self.target.table)
        );
        if let Some(hint) = self.index_hint {
            sql.push_str(&format!(" FORCE INDEX ({})", quote_ident(hint)));
        }
        sql.push_str(&format!(" WHERE ({})", self.where_clause));
        let paging = self.paging_key();
        if self.cursor.is_some() {
            let lhs = if paging.len() == 1 {
                paging[0].clone()
            } else {
                format!("({})", paging.join(", "))
            };
            sql.push_str(&format!(" AND {} > {}", lhs, placeholder_tuple(self.key.len())));
        }
        sql.push_str(&format!(" ORDER BY {} LIMIT {}", paging.join(", "), limit));
        if self.delete_from_source {
            sql.push_str(" FOR UPDATE");
        }
        sql
    }

    fn insert_sql(&self, rows: usize) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| quote_ident(&c.name)).collect();
        let placeholders: Vec<&str> = self.columns.iter().map(Column::insert_placeholder).collect();
        let tuple = format!("({})", placeholders.join(", "));
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            qualified(&self.target.archive_database, &self.target.archive_table),
            columns.join(", "),
            vec![tuple; rows].join(", ")
        )
    }

    fn delete_sql(&self, rows: usize) -> String {
        let tuple = placeholder_tuple(self.key.len());
        format!(
            "DELETE FROM {} WHERE {} IN ({})",
            qualified(&self.target.live_database, &self.target.table),
            key_tuple(&self.key),
            vec![tuple; rows].join(", ")
        )
    }

    fn key_values<'r>(&self, row: &'r RowValues) -> impl Iterator<Item = Option<&'r [u8]>> + 'r {
        let idx = self.key_idx.clone();
        idx.into_iter().map(move |i| row[i].as_deref())
    }
}

#[async_trait]
impl BatchStep for CopyStep<'_> {
    async fn next_batch(&mut self, limit: u64) -> Result<u64> {
        let mut live_tx = self.live.begin().await?;

        let select = self.select_sql(limit);
        let mut query = sqlx::query(&select);
        if let Some(cursor) = &self.cursor {
            for value in cursor {
                query = query.bind(value.as_deref());
            }
        }
        let fetched: Vec<MySqlRow> = query.fetch_all(&mut *live_tx).await?;
        if fetched.is_empty() {
            live_tx.commit().await?;
            return Ok(0);
        }

        let width = self.columns.len();
        let rows: Vec<RowValues> = fetched
            .iter()
            .map(|row| {
                (0..width)
                    .map(|i| row.try_get::<Option<Vec<u8>>, _>(i))
                    .collect::<std::result::Result<RowValues, sqlx::Error>>()
            })
            .collect::<std::result::Result<_, sqlx::Error>>()?;

        let mut archive_tx = self.archive.begin().await?;
        for chunk in rows.chunks((MAX_PLACEHOLDERS / width).max(1)) {
            let insert = self.insert_sql(chunk.len());
            let mut query = sqlx::query(&insert);
            for row in chunk {
                for value in row {
                    query = query.bind(value.as_deref());
                }
            }
            query.execute(&mut *archive_tx).await?;
        }
        archive_tx.commit().await?;

        if self.delete_from_source {
            let mut deleted = 0;
            for chunk in rows.chunks((MAX_PLACEHOLDERS / self.key.len()).max(1)) {
                let delete = self.delete_sql(chunk.len());
                let mut query = sqlx::query(&delete);
                for row in chunk {
                    for value in self.key_values(row) {
                        query = query.bind(value);
                    }
                }
                deleted += query.execute(&mut *live_tx).await?.rows_affected();
            }
            // Dropping `live_tx` on error rolls the delete back.
            confirm_deleted(self.target, rows.len() as u64, deleted)?;
        } else if let Some(last) = rows.last() {
            self.cursor = Some(self.key_values(last).map(|v| v.map(<[u8]>::to_vec)).collect());
        }
        live_tx.commit().await?;

        Ok(rows.len() as u64)
    }
}

/// Every copied row must leave the live table, or the next batch would copy it again.
fn confirm_deleted(target: &StagingTarget, copied: u64, deleted: u64) -> Result<()> {
    if deleted == copied {
        return Ok(());
    }
    Err(DbError::invalid_state(format!(
        "{}: copied {} rows to {} but deleted {}",
        target.live_qualified(),
        copied,
        target.staging_qualified(),
        deleted
    )))
}
