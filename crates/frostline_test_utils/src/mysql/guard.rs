use anyhow::Result;
use frostline_protocol::defaults::ARCHIVE_SUFFIX;
use sqlx::mysql::{MySqlPool, MySqlRow};
use tracing::{debug, warn};
use uuid::Uuid;

/// RAII guard for MySQL test isolation.
///
/// Creates a uniquely named live database for each test. On drop it removes that database and
/// its `<db>_archive` twin.
///
/// ```rust,ignore
/// let server = TestMySqlPool::new().await.unwrap();
/// let guard = MySqlTestGuard::new(server.pool.clone()).await.unwrap();
/// guard.execute("CREATE TABLE orders (id BIGINT PRIMARY KEY)").await.unwrap();
/// ```
pub struct MySqlTestGuard {
    pool: MySqlPool,
    database: String,
}

impl MySqlTestGuard {
    pub async fn new(pool: MySqlPool) -> Result<Self> {
        let database = format!("fl_test_{}", Uuid::new_v4().simple());
        debug!("Creating test database: {}", database);
        sqlx::raw_sql(&format!("CREATE DATABASE `{}`", database))
            .execute(&pool)
            .await?;
        Ok(Self { pool, database })
    }

    /// Run `query` with the test database selected.
    ///
    /// Uses a transaction so `USE` and the query share a connection.
    pub async fn execute(&self, query: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::raw_sql(&format!("USE `{}`", self.database))
            .execute(&mut *tx)
            .await?;
        sqlx::raw_sql(query).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn fetch_all(&self, query: &str) -> Result<Vec<MySqlRow>> {
        let mut tx = self.pool.begin().await?;
        sqlx::raw_sql(&format!("USE `{}`", self.database))
            .execute(&mut *tx)
            .await?;
        let rows = sqlx::query(query).fetch_all(&mut *tx).await?;
        tx.commit().await?;
        Ok(rows)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn archive_database(&self) -> String {
        format!("{}{}", self.database, ARCHIVE_SUFFIX)
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Drop both databases now and report failures.
    pub async fn cleanup(&self) -> Result<()> {
        for db in [self.database.clone(), self.archive_database()] {
            sqlx::raw_sql(&format!("DROP DATABASE IF EXISTS `{}`", db))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

impl Drop for MySqlTestGuard {
    fn drop(&mut self) {
        let pool = self.pool.clone();
        let databases = [self.database.clone(), self.archive_database()];

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                for db in databases {
                    match sqlx::raw_sql(&format!("DROP DATABASE IF EXISTS `{}`", db))
                        .execute(&pool)
                        .await
                    {
                        Ok(_) => debug!("Dropped test database: {}", db),
                        Err(e) => warn!("Failed to drop test database {}: {}", db, e),
                    }
                }
            });
        } else {
            warn!(
                "Not in async context, cannot clean up database: {}",
                self.database
            );
        }
    }
}
