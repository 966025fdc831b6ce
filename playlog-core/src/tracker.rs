//! Outward-facing service surface for the request layer.

use crate::error::{CoreError, Result, SourceError};
use crate::event::PlayEvent;
use crate::rollup::{TopAlbum, TopArtist, TopTrack};
use crate::source::PlaybackSource;
use crate::store::EventStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Facade over the source and store exposing the operations a request layer
/// consumes: manual record, history listing, and the three rollups.
///
/// Identity is supplied per call, exactly as the request layer provides it.
pub struct Tracker {
    source: Arc<dyn PlaybackSource>,
    store: EventStore,
}

impl Tracker {
    #[must_use]
    pub fn new(source: Arc<dyn PlaybackSource>, store: EventStore) -> Self {
        Self { source, store }
    }

    /// The identity the configured source observes. Useful when the caller
    /// has not specified one.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotAuthenticated`] when no credential is
    /// available.
    pub async fn default_identity(&self) -> Result<String> {
        self.source
            .ensure_credential()
            .await
            .map_err(auth_to_core)?;
        self.source.identity().await.map_err(CoreError::Source)
    }

    /// Record whatever is playing right now, bypassing the change detector.
    ///
    /// The on-demand counterpart of the poller's write path; the store's
    /// uniqueness constraint absorbs any overlap between the two.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotAuthenticated`] when no valid credential exists,
    /// [`CoreError::NothingPlaying`] when playback is inactive.
    pub async fn record_if_playing(&self, user_id: &str) -> Result<PlayEvent> {
        self.source
            .ensure_credential()
            .await
            .map_err(auth_to_core)?;

        let snapshot = self
            .source
            .current_playback()
            .await
            .map_err(CoreError::Source)?
            .filter(|s| s.is_playing)
            .ok_or(CoreError::NothingPlaying)?;

        let event = PlayEvent::from_snapshot(user_id, &snapshot, Utc::now())
            .ok_or(CoreError::NothingPlaying)?;

        self.store.append(event).await
    }

    /// Paginated listening history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn history(
        &self,
        user_id: &str,
        skip: u32,
        limit: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PlayEvent>> {
        self.store.list(user_id, skip, limit, since).await
    }

    /// Most-played tracks.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn top_tracks(
        &self,
        user_id: &str,
        limit: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<TopTrack>> {
        self.store.top_tracks(user_id, limit, since).await
    }

    /// Most-played artists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn top_artists(
        &self,
        user_id: &str,
        limit: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<TopArtist>> {
        self.store.top_artists(user_id, limit, since).await
    }

    /// Most-played albums.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn top_albums(
        &self,
        user_id: &str,
        limit: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<TopAlbum>> {
        self.store.top_albums(user_id, limit, since).await
    }
}

fn auth_to_core(e: SourceError) -> CoreError {
    match e {
        SourceError::NoCredential | SourceError::RefreshRejected { .. } => {
            CoreError::NotAuthenticated
        }
        other => CoreError::Source(other),
    }
}
