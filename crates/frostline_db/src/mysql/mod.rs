//! MySQL backend: live and archive connection pools plus the collaborator implementations.
//!
//! The live host holds the tables being archived; the archive host holds `<db>_archive`. They
//! may be the same server. Each pool is small because Frostline issues one statement at a time.

mod catalog;
mod copier;
pub mod ddl;
mod exporter;
mod schema;

use crate::error::{DbError, Result};
use frostline_protocol::{CopyConfig, DatabaseConfig};
use sqlx::mysql::{MySqlConnectOptions, MySqlDatabaseError, MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use tracing::info;

/// MySQL "Table already exists" (ER_TABLE_EXISTS_ERROR).
const ER_TABLE_EXISTS: u16 = 1050;

const POOL_MAX_CONNECTIONS: u32 = 2;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Staging catalog, copier, and exporter backed by MySQL.
#[derive(Clone)]
pub struct MySqlWarehouse {
    live: MySqlPool,
    archive: MySqlPool,
    delete_from_source: bool,
}

impl std::fmt::Debug for MySqlWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlWarehouse")
            .field("backend", &"MySQL")
            .field("delete_from_source", &self.delete_from_source)
            .finish()
    }
}

impl MySqlWarehouse {
    /// Connect to the live and archive hosts.
    pub async fn connect(database: &DatabaseConfig, copy: &CopyConfig) -> Result<Self> {
        let live = connect_pool(database, &database.host).await?;
        let archive = connect_pool(database, database.archive_host()).await?;
        info!(
            host = %database.host,
            archive_host = %database.archive_host(),
            database = %database.database,
            "Connected to MySQL"
        );
        Ok(Self::from_pools(live, archive, copy.delete_from_source))
    }

    pub fn from_pools(live: MySqlPool, archive: MySqlPool, delete_from_source: bool) -> Self {
        Self {
            live,
            archive,
            delete_from_source,
        }
    }

    pub fn live_pool(&self) -> &MySqlPool {
        &self.live
    }

    pub fn archive_pool(&self) -> &MySqlPool {
        &self.archive
    }

    /// Close both pools.
    pub async fn close(&self) {
        self.live.close().await;
        self.archive.close().await;
    }
}

async fn connect_pool(database: &DatabaseConfig, host: &str) -> Result<MySqlPool> {
    let mut options = MySqlConnectOptions::new()
        .host(host)
        .port(database.port)
        .username(&database.user);
    if let Some(password) = database.password.as_deref() {
        options = options.password(password);
    }

    let pool = MySqlPoolOptions::new()
        .max_connections(POOL_MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// MySQL server error number, if `err` came from the server.
pub(crate) fn mysql_error_number(err: &sqlx::Error) -> Option<u16> {
    err.as_database_error()
        .and_then(|db_err| db_err.try_downcast_ref::<MySqlDatabaseError>())
        .map(|mysql_err| mysql_err.number())
}

/// Map a CREATE TABLE failure, recognizing the "already exists" conflict.
pub(crate) fn map_create_error(err: sqlx::Error, database: &str, table: &str) -> DbError {
    if mysql_error_number(&err) == Some(ER_TABLE_EXISTS) {
        DbError::duplicate_table(database, table)
    } else {
        DbError::Sqlx(err)
    }
}
