//! Filesystem locations used by CodePilot

use std::path::PathBuf;

/// Environment variable that relocates the data directory
pub const HOME_ENV: &str = "CODEPILOT_HOME";

/// Data directory (`$CODEPILOT_HOME` or `~/.codepilot`)
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(HOME_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".codepilot")
}

/// Config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}
