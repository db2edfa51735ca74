//! Process-wide configuration, loaded once at startup and passed down by reference.

use crate::defaults::{
    DEFAULT_BACKOFF_MS, DEFAULT_MAX_BACKOFF_MS, DEFAULT_MAX_CYCLES, DEFAULT_MYSQL_PORT,
    DEFAULT_TRANSACTION_SIZE, PASSWORD_ENV,
};
use crate::error::ConfigError;
use crate::paths::default_work_dir;
use crate::types::ArchiveJob;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Canonical configuration used by the archiver binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrostlineConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub copy: CopyConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub reporting: ReportingConfig,
    #[serde(default)]
    pub jobs: Vec<ArchiveJob>,
}

/// Live/archive MySQL connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Host holding the live tables.
    pub host: String,
    /// Host holding `<db>_archive`; defaults to `host`.
    #[serde(default)]
    pub archive_host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Live database name.
    pub database: String,
    #[serde(default = "default_transaction_size")]
    pub transaction_size: u64,
}

impl DatabaseConfig {
    pub fn archive_host(&self) -> &str {
        self.archive_host.as_deref().unwrap_or(&self.host)
    }
}

/// Cold storage destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Object store URL: `s3://bucket/prefix`, `file:///path`, `memory://`, ...
    pub url: String,
    /// Extra options passed to the object store builder (region, endpoint, ...).
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// Directory for local extracts.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(default_work_dir)
    }
}

/// Bulk copy behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyConfig {
    /// Delete copied rows from the live table in the same live-side transaction.
    #[serde(default = "default_true")]
    pub delete_from_source: bool,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            delete_from_source: true,
        }
    }
}

/// Bound on drain-then-retry cycles per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_cycles: DEFAULT_MAX_CYCLES,
            backoff_ms: DEFAULT_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

impl RetryPolicy {
    /// No waiting between cycles. Used by tests.
    pub fn immediate(max_cycles: u32) -> Self {
        Self {
            max_cycles,
            backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay after the given 1-based conflict cycle: doubles each cycle, capped.
    pub fn backoff_for(&self, cycle: u32) -> Duration {
        let shift = cycle.saturating_sub(1).min(20);
        let ms = self
            .backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms.max(self.backoff_ms));
        Duration::from_millis(ms)
    }
}

/// Where unrecovered failures are recorded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Append one JSON line per incident to this file.
    #[serde(default)]
    pub incident_log: Option<PathBuf>,
}

impl FrostlineConfig {
    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: FrostlineConfig =
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.apply_env_overrides();
        config.check()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: FrostlineConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.check()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            self.database.password = Some(password);
        }
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.database.host.trim().is_empty() {
            return Err(ConfigError::invalid("database.host is empty"));
        }
        if self.database.database.trim().is_empty() {
            return Err(ConfigError::invalid("database.database is empty"));
        }
        if self.database.transaction_size == 0 {
            return Err(ConfigError::invalid(
                "database.transaction_size must be positive",
            ));
        }
        if self.storage.url.trim().is_empty() {
            return Err(ConfigError::invalid("storage.url is empty"));
        }
        if self.retry.max_cycles == 0 {
            return Err(ConfigError::invalid("retry.max_cycles must be at least 1"));
        }
        Ok(())
    }
}

fn default_port() -> u16 {
    DEFAULT_MYSQL_PORT
}

fn default_transaction_size() -> u64 {
    DEFAULT_TRANSACTION_SIZE
}

fn default_true() -> bool {
    true
}

fn default_max_cycles() -> u32 {
    DEFAULT_MAX_CYCLES
}

fn default_backoff_ms() -> u64 {
    DEFAULT_BACKOFF_MS
}

fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}
