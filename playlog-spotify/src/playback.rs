//! Spotify-backed implementation of the engine's playback source.

use crate::error::SpotifyError;
use crate::session::SpotifySession;
use async_trait::async_trait;
use chrono::Utc;
use playlog_core::{PlaybackSnapshot, PlaybackSource, SourceError};
use rspotify::model::{CurrentPlaybackContext, PlayableItem};
use rspotify::prelude::*;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Samples the authenticated user's current playback via the Web API.
pub struct SpotifySource {
    session: Arc<SpotifySession>,
    user_id: OnceCell<String>,
}

impl SpotifySource {
    #[must_use]
    pub fn new(session: Arc<SpotifySession>) -> Self {
        Self {
            session,
            user_id: OnceCell::new(),
        }
    }

    fn snapshot_from(context: CurrentPlaybackContext) -> PlaybackSnapshot {
        let observed_at = Utc::now();

        match context.item {
            Some(PlayableItem::Track(track)) => PlaybackSnapshot {
                is_playing: context.is_playing,
                // Just the ID part, not the full URI (spotify:track:xxx -> xxx)
                track_id: track.id.as_ref().map(|id| id.id().to_string()),
                track_name: track.name,
                artist_names: track.artists.into_iter().map(|a| a.name).collect(),
                album_name: track.album.name,
                album_image_url: track.album.images.first().map(|img| img.url.clone()),
                observed_at,
            },
            Some(PlayableItem::Episode(episode)) => PlaybackSnapshot {
                is_playing: context.is_playing,
                track_id: Some(episode.id.id().to_string()),
                track_name: episode.name,
                artist_names: vec![episode.show.name],
                album_name: "Podcast".to_string(),
                album_image_url: episode.images.first().map(|img| img.url.clone()),
                observed_at,
            },
            None => PlaybackSnapshot::stopped(observed_at),
        }
    }
}

#[async_trait]
impl PlaybackSource for SpotifySource {
    fn name(&self) -> &'static str {
        "spotify"
    }

    async fn ensure_credential(&self) -> Result<(), SourceError> {
        self.session.ensure_token_fresh().await
    }

    async fn identity(&self) -> Result<String, SourceError> {
        self.user_id
            .get_or_try_init(|| async {
                let id = self
                    .session
                    .current_user_id()
                    .await
                    .map_err(SourceError::from)?;
                debug!(user_id = %id, "resolved Spotify identity");
                Ok(id)
            })
            .await
            .cloned()
    }

    async fn current_playback(&self) -> Result<Option<PlaybackSnapshot>, SourceError> {
        let playback = self
            .session
            .client()
            .current_playback(None, None::<Vec<_>>)
            .await
            .map_err(SpotifyError::from)
            .map_err(SourceError::from)?;

        Ok(playback.map(Self::snapshot_from))
    }
}
