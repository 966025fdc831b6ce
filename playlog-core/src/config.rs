use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
}

fn default_redirect_uri() -> String {
    "http://127.0.0.1:8888/callback".into()
}

/// Knobs consumed by the poll scheduler and change detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Seconds between playback samples.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Seconds to wait while no credential is available.
    #[serde(default = "default_idle_interval")]
    pub idle_interval_secs: u64,
    /// Seconds before an untouched change-detector entry is reclaimed.
    #[serde(default = "default_detector_ttl")]
    pub detector_ttl_secs: u64,
    /// Ceiling on the exponential backoff sleep.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

const fn default_poll_interval() -> u64 {
    10
}

const fn default_idle_interval() -> u64 {
    30
}

const fn default_detector_ttl() -> u64 {
    3600
}

const fn default_max_backoff() -> u64 {
    300
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            idle_interval_secs: default_idle_interval(),
            detector_ttl_secs: default_detector_ttl(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl TrackerConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub const fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.idle_interval_secs)
    }

    #[must_use]
    pub const fn detector_ttl(&self) -> Duration {
        Duration::from_secs(self.detector_ttl_secs)
    }

    #[must_use]
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Override for the history database location.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl StorageConfig {
    /// The effective database path (`~/.config/playlog/play_history.db`
    /// unless overridden).
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(crate::paths::history_db_path)
    }
}

impl Config {
    /// Get the configuration directory path (~/.config/playlog/)
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path (~/.config/playlog/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from file or create template on first run
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read, parsed, or if
    /// required fields are missing.
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(&config_path, CONFIG_TEMPLATE)?;

            return Err(CoreError::ConfigNotFound { path: config_path });
        }

        let content = fs::read_to_string(&config_path)?;
        Self::parse(&content)
    }

    /// Parse and validate a config document.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid TOML or missing required fields.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;

        if config.spotify.client_id.is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "spotify.client_id".to_string(),
            });
        }
        if config.spotify.client_secret.is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "spotify.client_secret".to_string(),
            });
        }

        Ok(config)
    }
}

pub const CONFIG_TEMPLATE: &str = r#"# Playlog Configuration
# ~/.config/playlog/config.toml

[spotify]
# Required: Get these from https://developer.spotify.com/dashboard
client_id = ""
client_secret = ""
redirect_uri = "http://127.0.0.1:8888/callback"

[tracker]
# Seconds between playback samples
poll_interval_secs = 10
# Seconds between retries while no credential is cached
idle_interval_secs = 30
# Seconds before an idle user's dedup state is reclaimed
detector_ttl_secs = 3600
# Ceiling for the error backoff sleep
max_backoff_secs = 300

[storage]
# Defaults to ~/.config/playlog/play_history.db
# db_path = "/var/lib/playlog/play_history.db"
"#;
