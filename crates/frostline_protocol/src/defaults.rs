//! Canonical default values shared across Frostline crates.

pub const ARCHIVE_SUFFIX: &str = "_archive";
pub const COMPRESSED_SUFFIX: &str = ".gz";
pub const EXTRACT_EXTENSION: &str = "tsv";
pub const DEFAULT_CONFIG_FILE: &str = "frostline.toml";
pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_TRANSACTION_SIZE: u64 = 1000;
pub const DEFAULT_MAX_CYCLES: u32 = 5;
pub const DEFAULT_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;
pub const PASSWORD_ENV: &str = "FROSTLINE_DB_PASSWORD";
pub const CONFIG_ENV: &str = "FROSTLINE_CONFIG";
pub const HOME_ENV: &str = "FROSTLINE_HOME";
