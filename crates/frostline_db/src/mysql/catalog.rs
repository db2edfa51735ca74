use super::ddl::staging_ddl;
use super::{map_create_error, MySqlWarehouse};
use crate::error::Result;
use crate::sql_guard::{qualified, quote_ident};
use crate::traits::StagingCatalog;
use async_trait::async_trait;
use frostline_protocol::{ColumnBounds, StagingTarget};
use sqlx::Row;
use tracing::{debug, info};

#[async_trait]
impl StagingCatalog for MySqlWarehouse {
    async fn ensure_archive_database(&self, target: &StagingTarget) -> Result<()> {
        let sql = format!(
            "CREATE DATABASE IF NOT EXISTS {}",
            quote_ident(&target.archive_database)
        );
        sqlx::raw_sql(&sql).execute(&self.archive).await?;
        debug!(database = %target.archive_database, "Archive database ensured");
        Ok(())
    }

    async fn create_staging_table(&self, target: &StagingTarget) -> Result<()> {
        let show = format!(
            "SHOW CREATE TABLE {}",
            qualified(&target.live_database, &target.table)
        );
        let row = sqlx::raw_sql(&show).fetch_one(&self.live).await?;
        let live_ddl: String = row.try_get(1)?;

        let ddl = staging_ddl(&live_ddl, &target.archive_database, &target.archive_table)?;
        sqlx::raw_sql(&ddl)
            .execute(&self.archive)
            .await
            .map_err(|e| map_create_error(e, &target.archive_database, &target.archive_table))?;

        info!(staging = %target.staging_qualified(), "Staging table created");
        Ok(())
    }

    async fn drop_staging_table(&self, target: &StagingTarget) -> Result<()> {
        let sql = format!(
            "DROP TABLE IF EXISTS {}",
            qualified(&target.archive_database, &target.archive_table)
        );
        sqlx::raw_sql(&sql).execute(&self.archive).await?;
        Ok(())
    }

    async fn count_staged_rows(&self, target: &StagingTarget) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}",
            qualified(&target.archive_database, &target.archive_table)
        );
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.archive).await?;
        Ok(count.max(0) as u64)
    }

    async fn log_column_bounds(
        &self,
        target: &StagingTarget,
        column: &str,
    ) -> Result<Option<ColumnBounds>> {
        let col = quote_ident(column);
        let sql = format!(
            "SELECT CAST(MIN({col}) AS CHAR), CAST(MAX({col}) AS CHAR) FROM {}",
            qualified(&target.archive_database, &target.archive_table)
        );
        let (min, max): (Option<String>, Option<String>) =
            sqlx::query_as(&sql).fetch_one(&self.archive).await?;

        Ok(match (min, max) {
            (Some(min), Some(max)) => Some(ColumnBounds::new(min, max)),
            _ => None,
        })
    }
}
