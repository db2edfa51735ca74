use crate::defaults::{DEFAULT_CONFIG_FILE, HOME_ENV};
use std::path::PathBuf;

/// Resolve the Frostline home directory.
///
/// Priority:
/// 1) FROSTLINE_HOME
/// 2) HOME/USERPROFILE
/// 3) ./.frostline
pub fn frostline_home() -> PathBuf {
    if let Ok(override_path) = std::env::var(HOME_ENV) {
        return PathBuf::from(override_path);
    }
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        return PathBuf::from(home).join(".frostline");
    }
    PathBuf::from(".").join(".frostline")
}

/// Default config path: ~/.frostline/frostline.toml
pub fn default_config_path() -> PathBuf {
    frostline_home().join(DEFAULT_CONFIG_FILE)
}

/// Default logs directory: ~/.frostline/logs
pub fn default_logs_dir() -> PathBuf {
    frostline_home().join("logs")
}

/// Default extract work directory: ~/.frostline/work
pub fn default_work_dir() -> PathBuf {
    frostline_home().join("work")
}
