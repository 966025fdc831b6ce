//! Path constants for configuration and data files.

use std::path::PathBuf;

/// The name of the configuration directory under ~/.config/
pub const CONFIG_DIR_NAME: &str = "playlog";

/// The name of the main configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The name of the play history database file
pub const HISTORY_DB_FILE_NAME: &str = "play_history.db";

/// Get the configuration directory path (~/.config/playlog/)
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(CONFIG_DIR_NAME)
}

/// Get the config file path (~/.config/playlog/config.toml)
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Get the play history database path (`~/.config/playlog/play_history.db`)
#[must_use]
pub fn history_db_path() -> PathBuf {
    config_dir().join(HISTORY_DB_FILE_NAME)
}
