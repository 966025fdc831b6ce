//! Persisted-token Spotify session with transparent refresh.
//!
//! The interactive authorization flow lives outside this crate; the session
//! only consumes a token cache an auth flow has already written, refreshing
//! and re-persisting it as needed.

use crate::error::{Result, SpotifyError};
use playlog_core::SourceError;
use rspotify::{prelude::*, scopes, AuthCodeSpotify, Credentials, OAuth, Token};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Refresh token proactively if it expires within this many seconds
const PROACTIVE_REFRESH_THRESHOLD_SECS: i64 = 60;

/// Persisted token data
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>, // Unix timestamp
    scopes: Vec<String>,
}

impl From<&Token> for PersistedToken {
    fn from(token: &Token) -> Self {
        Self {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token.expires_at.map(|d| d.timestamp()),
            scopes: token.scopes.iter().cloned().collect(),
        }
    }
}

impl From<PersistedToken> for Token {
    fn from(persisted: PersistedToken) -> Self {
        Self {
            access_token: persisted.access_token,
            refresh_token: persisted.refresh_token,
            expires_at: persisted
                .expires_at
                .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)),
            expires_in: chrono::TimeDelta::zero(),
            scopes: persisted.scopes.into_iter().collect(),
        }
    }
}

/// Spotify session manager: wraps the API client and its token lifecycle.
pub struct SpotifySession {
    client: AuthCodeSpotify,
    token_path: PathBuf,
}

impl SpotifySession {
    /// Create a new session from application credentials.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        let creds = Credentials::new(&client_id.into(), &client_secret.into());

        let oauth = OAuth {
            redirect_uri: redirect_uri.into(),
            scopes: scopes!("user-read-currently-playing", "user-read-playback-state"),
            ..Default::default()
        };

        Self {
            client: AuthCodeSpotify::new(creds, oauth),
            token_path: crate::paths::spotify_token_cache_path(),
        }
    }

    /// Override the token cache location (used by tests).
    #[must_use]
    pub fn with_token_path(mut self, path: PathBuf) -> Self {
        self.token_path = path;
        self
    }

    /// The underlying API client.
    #[must_use]
    pub const fn client(&self) -> &AuthCodeSpotify {
        &self.client
    }

    /// Acquire lock on token.
    async fn lock_token(&self) -> Result<futures::lock::MutexGuard<'_, Option<Token>>> {
        self.client
            .token
            .lock()
            .await
            .map_err(|_| SpotifyError::AuthFailed {
                reason: "Failed to acquire token lock".to_string(),
            })
    }

    /// Try to load the cached token into the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the token file cannot be read or parsed.
    pub async fn load_cached_token(&self) -> Result<bool> {
        if !self.token_path.exists() {
            debug!("No cached token file found at {:?}", self.token_path);
            return Ok(false);
        }

        let content = fs::read_to_string(&self.token_path)?;
        let persisted: PersistedToken = serde_json::from_str(&content)?;
        *self.lock_token().await? = Some(Token::from(persisted));

        info!("Loaded cached Spotify token from {:?}", self.token_path);
        Ok(true)
    }

    /// Save current token to file
    async fn save_token(&self) -> Result<()> {
        let token_guard = self.lock_token().await?;
        if let Some(ref token) = *token_guard {
            let persisted = PersistedToken::from(token);

            if let Some(parent) = self.token_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let content = serde_json::to_string_pretty(&persisted)?;
            fs::write(&self.token_path, content)?;
            debug!("Saved Spotify token to {:?}", self.token_path);
        }
        Ok(())
    }

    /// Refresh the access token and persist the rotated credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh is rejected or the token cannot be
    /// saved.
    pub async fn refresh_token(&self) -> Result<()> {
        info!("Refreshing Spotify access token");

        self.client
            .refresh_token()
            .await
            .map_err(|e| SpotifyError::AuthFailed {
                reason: format!("Token refresh failed: {e}"),
            })?;

        self.save_token().await?;
        Ok(())
    }

    /// Make sure a usable access token is loaded, refreshing proactively
    /// when it expires within the threshold.
    ///
    /// # Errors
    ///
    /// [`SourceError::NoCredential`] when no token cache exists,
    /// [`SourceError::RefreshRejected`] when the refresh is rejected.
    pub async fn ensure_token_fresh(&self) -> std::result::Result<(), SourceError> {
        let loaded = {
            let token_guard = self.lock_token().await.map_err(SourceError::from)?;
            token_guard.is_some()
        };

        if !loaded && !self.load_cached_token().await.map_err(SourceError::from)? {
            return Err(SourceError::NoCredential);
        }

        let needs_refresh = {
            let token_guard = self.lock_token().await.map_err(SourceError::from)?;
            Self::check_needs_refresh(token_guard.as_ref())
        };

        if needs_refresh {
            self.refresh_token().await.map_err(SourceError::from)?;
        }

        Ok(())
    }

    /// Check if token needs refresh (expires within threshold).
    fn check_needs_refresh(token_opt: Option<&Token>) -> bool {
        let Some(token) = token_opt else {
            return false;
        };

        let Some(expires_at) = token.expires_at else {
            // No expiration time, assume it's fine
            return false;
        };

        let seconds_until_expiry = (expires_at - chrono::Utc::now()).num_seconds();
        if seconds_until_expiry <= PROACTIVE_REFRESH_THRESHOLD_SECS {
            debug!(
                "Token expires in {}s (threshold: {}s), refreshing proactively",
                seconds_until_expiry, PROACTIVE_REFRESH_THRESHOLD_SECS
            );
            true
        } else {
            false
        }
    }

    /// Resolve the Spotify user id of the authenticated account.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile request fails.
    pub async fn current_user_id(&self) -> Result<String> {
        let user = self.client.me().await?;
        Ok(user.id.id().to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};

    fn session_at(path: PathBuf) -> SpotifySession {
        SpotifySession::new("client-id", "client-secret", "http://127.0.0.1:8888/callback")
            .with_token_path(path)
    }

    fn token(expires_in_secs: i64) -> Token {
        Token {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Some(Utc::now() + TimeDelta::seconds(expires_in_secs)),
            ..Default::default()
        }
    }

    #[test]
    fn test_persisted_token_round_trip() {
        let original = token(3600);
        let persisted = PersistedToken::from(&original);
        let json = serde_json::to_string(&persisted).unwrap();
        let restored: PersistedToken = serde_json::from_str(&json).unwrap();
        let restored = Token::from(restored);

        assert_eq!(restored.access_token, original.access_token);
        assert_eq!(restored.refresh_token, original.refresh_token);
        assert_eq!(
            restored.expires_at.map(|t| t.timestamp()),
            original.expires_at.map(|t| t.timestamp())
        );
    }

    #[test]
    fn test_check_needs_refresh() {
        assert!(SpotifySession::check_needs_refresh(Some(&token(30))));
        assert!(!SpotifySession::check_needs_refresh(Some(&token(3600))));
        assert!(!SpotifySession::check_needs_refresh(None));
    }

    #[tokio::test]
    async fn test_missing_cache_reports_no_credential() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_at(dir.path().join("token.json"));

        let loaded = session.load_cached_token().await.unwrap();
        assert!(!loaded);

        let err = session.ensure_token_fresh().await.unwrap_err();
        assert!(matches!(err, SourceError::NoCredential));
    }

    #[tokio::test]
    async fn test_save_and_reload_token_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");

        let session = session_at(path.clone());
        *session.lock_token().await.unwrap() = Some(token(3600));
        session.save_token().await.unwrap();

        let reloaded = session_at(path);
        assert!(reloaded.load_cached_token().await.unwrap());
        // A fresh token needs no refresh, so the credential check passes
        // without touching the network.
        reloaded.ensure_token_fresh().await.unwrap();
    }
}
