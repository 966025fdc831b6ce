use playlog_core::SourceError;
use thiserror::Error;

/// Unified error type for all Spotify-related operations.
#[derive(Debug, Error)]
pub enum SpotifyError {
    /// Authentication failed during token load or refresh.
    #[error("Spotify authentication failed: {reason}")]
    AuthFailed { reason: String },

    /// Token has expired and could not be refreshed.
    #[error("Spotify token expired and refresh failed")]
    TokenExpired,

    /// Error from the Spotify API client.
    #[error("Spotify API error: {0}")]
    Api(#[from] rspotify::ClientError),

    /// Failed to read the token cache file or perform I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize JSON data.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results with `SpotifyError`.
pub type Result<T> = std::result::Result<T, SpotifyError>;

/// Classify adapter failures into the engine's source error taxonomy:
/// auth problems must read as "re-authenticate", everything else retries.
impl From<SpotifyError> for SourceError {
    fn from(e: SpotifyError) -> Self {
        match e {
            SpotifyError::AuthFailed { .. } | SpotifyError::TokenExpired => {
                Self::RefreshRejected {
                    reason: e.to_string(),
                }
            }
            other => Self::Transient {
                reason: other.to_string(),
            },
        }
    }
}
