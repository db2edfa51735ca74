use super::schema::{primary_key_columns, select_list, table_columns};
use super::MySqlWarehouse;
use crate::batch::{run_batches, BatchReport, BatchStep};
use crate::error::Result;
use crate::sql_guard::{qualified, quote_ident};
use crate::traits::RowExporter;
use crate::tsv;
use async_trait::async_trait;
use frostline_protocol::StagingTarget;
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::Row;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

#[async_trait]
impl RowExporter for MySqlWarehouse {
    async fn export_rows(
        &self,
        target: &StagingTarget,
        batch_size: u64,
        path: &Path,
    ) -> Result<BatchReport> {
        let columns =
            table_columns(&self.archive, &target.archive_database, &target.archive_table).await?;
        let key =
            primary_key_columns(&self.archive, &target.archive_database, &target.archive_table)
                .await?;

        // Stable paging order; ordinals stand in for a missing primary key.
        let order_by = if key.is_empty() {
            (1..=columns.len())
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            key.iter()
                .map(|k| quote_ident(k))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let select = format!(
            "SELECT {} FROM {} ORDER BY {}",
            select_list(&columns),
            qualified(&target.archive_database, &target.archive_table),
            order_by
        );

        let file = File::create(path)?;
        let mut step = ExportStep {
            pool: &self.archive,
            select,
            width: columns.len(),
            offset: 0,
            out: BufWriter::new(file),
        };
        let report = run_batches(&mut step, batch_size, &target.archive_table).await?;

        let file = step.out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        info!(
            staging = %target.staging_qualified(),
            path = %path.display(),
            rows = report.total_rows(),
            "Staging table exported"
        );
        Ok(report)
    }
}

struct ExportStep<'a> {
    pool: &'a MySqlPool,
    select: String,
    width: usize,
    offset: u64,
    out: BufWriter<File>,
}

#[async_trait]
impl BatchStep for ExportStep<'_> {
    async fn next_batch(&mut self, limit: u64) -> Result<u64> {
        let sql = format!("{} LIMIT {} OFFSET {}", self.select, limit, self.offset);
        let rows: Vec<MySqlRow> = sqlx::query(&sql).fetch_all(self.pool).await?;

        for row in &rows {
            let values = (0..self.width)
                .map(|i| row.try_get::<Option<Vec<u8>>, _>(i))
                .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;
            tsv::write_row(&mut self.out, &values)?;
        }
        self.out.flush()?;

        let moved = rows.len() as u64;
        self.offset += moved;
        Ok(moved)
    }
}
