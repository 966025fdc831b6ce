use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the ingestion-and-rollup engine.
#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template has been created - please edit it with your Spotify credentials and restart.")]
    ConfigNotFound { path: PathBuf },

    #[error("Missing required config field: {field}")]
    ConfigMissingField { field: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Outward-facing failures of the manual record path
    #[error("Not authenticated with the playback source")]
    NotAuthenticated,

    #[error("No track is currently playing")]
    NothingPlaying,

    // Playback source errors
    #[error("Playback source error: {0}")]
    Source(#[from] SourceError),

    // Store errors
    #[error("History database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results with [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Failure classes a playback source reports to the poll scheduler.
///
/// The scheduler reacts differently to each: a missing credential sleeps the
/// idle interval without counting as a failure, a rejected refresh backs off
/// but is logged distinctly so operators can tell "user must re-auth" from
/// "upstream flaky", and transient failures follow the backoff schedule.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No stored credential; the user has never authenticated.
    #[error("no credential cached; user authentication required")]
    NoCredential,

    /// A credential exists but refreshing it was rejected (revoked grant).
    #[error("credential refresh rejected: {reason}")]
    RefreshRejected { reason: String },

    /// Network, rate-limit, or upstream server failure; worth retrying.
    #[error("transient source failure: {reason}")]
    Transient { reason: String },
}
