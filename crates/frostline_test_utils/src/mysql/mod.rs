//! Docker-backed MySQL fixtures. Enabled by the `docker-tests` feature.
//!
//! ```text
//! docker compose -f crates/frostline_test_utils/docker/docker-compose.yml up -d
//! cargo test -p frostline_test_utils --features docker-tests
//! ```

mod guard;
mod lifecycle;

pub use guard::MySqlTestGuard;
pub use lifecycle::{ensure_container_running, wait_for_healthy};

use anyhow::Result;
use frostline_protocol::DatabaseConfig;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use tracing::info;

pub const SERVICE_NAME: &str = "mysql8";
pub const HOST_PORT: u16 = 13306;
pub const ROOT_PASSWORD: &str = "frostline_test";

/// Connection settings for the test container.
#[derive(Debug, Clone)]
pub struct TestMySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl Default for TestMySqlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: HOST_PORT,
            user: "root".to_string(),
            password: ROOT_PASSWORD.to_string(),
        }
    }
}

impl TestMySqlConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}",
            self.user, self.password, self.host, self.port
        )
    }

    /// `[database]` section pointing both hosts at the container.
    pub fn database_config(&self, database: &str) -> DatabaseConfig {
        DatabaseConfig {
            host: self.host.clone(),
            archive_host: None,
            port: self.port,
            user: self.user.clone(),
            password: Some(self.password.clone()),
            database: database.to_string(),
            transaction_size: frostline_protocol::defaults::DEFAULT_TRANSACTION_SIZE,
        }
    }
}

/// Server-level pool for the test container.
#[derive(Debug, Clone)]
pub struct TestMySqlPool {
    pub pool: MySqlPool,
    pub config: TestMySqlConfig,
}

impl TestMySqlPool {
    /// Start the container if needed, wait for it, and connect.
    pub async fn new() -> Result<Self> {
        ensure_container_running().await?;

        let config = TestMySqlConfig::default();
        info!("Creating MySQL pool on port {}", config.port);
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.connection_string())
            .await?;
        Ok(Self { pool, config })
    }

    pub async fn execute(&self, query: &str) -> Result<()> {
        sqlx::raw_sql(query).execute(&self.pool).await?;
        Ok(())
    }
}
