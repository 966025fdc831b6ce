use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display value substituted when a snapshot carries no artist names.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// One instantaneous sample of what is currently playing.
///
/// Produced by a [`PlaybackSource`](crate::source::PlaybackSource) on every
/// poll; never persisted directly. Whether a sample becomes a durable
/// [`PlayEvent`] is decided by the change detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    /// Whether playback is active right now.
    pub is_playing: bool,
    /// Source-native track identifier, absent for local files or ads.
    pub track_id: Option<String>,
    /// Track display name.
    pub track_name: String,
    /// Artist names in source order.
    pub artist_names: Vec<String>,
    /// Album display name.
    pub album_name: String,
    /// Cover art URL, if the source provided one.
    pub album_image_url: Option<String>,
    /// When this sample was taken.
    pub observed_at: DateTime<Utc>,
}

impl PlaybackSnapshot {
    /// A sample representing inactive playback (nothing playing, no device).
    #[must_use]
    pub fn stopped(observed_at: DateTime<Utc>) -> Self {
        Self {
            is_playing: false,
            track_id: None,
            track_name: String::new(),
            artist_names: Vec::new(),
            album_name: String::new(),
            album_image_url: None,
            observed_at,
        }
    }
}

/// A durable record of one play transition.
///
/// `(user_id, track_id, played_at)` is globally unique, enforced by the
/// event store's schema. Events are created exactly once per detected
/// transition and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub user_id: String,
    pub track_id: String,
    pub track_name: String,
    /// All artist names joined with ", " for display.
    pub artist_name: String,
    pub album_name: String,
    pub album_image_url: Option<String>,
    /// UTC-normalized time the play was observed.
    pub played_at: DateTime<Utc>,
}

impl PlayEvent {
    /// Build an event from a snapshot, or `None` when the snapshot carries
    /// no track identifier. Partial snapshots degrade to display defaults
    /// rather than being rejected.
    #[must_use]
    pub fn from_snapshot(
        user_id: &str,
        snapshot: &PlaybackSnapshot,
        played_at: DateTime<Utc>,
    ) -> Option<Self> {
        let track_id = snapshot.track_id.clone()?;
        let artist_name = if snapshot.artist_names.is_empty() {
            UNKNOWN_ARTIST.to_string()
        } else {
            snapshot.artist_names.join(", ")
        };

        Some(Self {
            user_id: user_id.to_string(),
            track_id,
            track_name: snapshot.track_name.clone(),
            artist_name,
            album_name: snapshot.album_name.clone(),
            album_image_url: snapshot.album_image_url.clone(),
            played_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(track_id: Option<&str>) -> PlaybackSnapshot {
        PlaybackSnapshot {
            is_playing: true,
            track_id: track_id.map(str::to_string),
            track_name: "Song".to_string(),
            artist_names: vec!["A".to_string(), "B".to_string()],
            album_name: "Album".to_string(),
            album_image_url: Some("https://img.example/cover.jpg".to_string()),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_from_snapshot_joins_artists() {
        let now = Utc::now();
        let event = PlayEvent::from_snapshot("u1", &snapshot(Some("t1")), now).unwrap();
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.track_id, "t1");
        assert_eq!(event.artist_name, "A, B");
        assert_eq!(event.played_at, now);
    }

    #[test]
    fn test_from_snapshot_without_track_id() {
        assert!(PlayEvent::from_snapshot("u1", &snapshot(None), Utc::now()).is_none());
    }

    #[test]
    fn test_from_snapshot_defaults_missing_artists() {
        let mut s = snapshot(Some("t1"));
        s.artist_names.clear();
        s.album_image_url = None;
        let event = PlayEvent::from_snapshot("u1", &s, Utc::now()).unwrap();
        assert_eq!(event.artist_name, UNKNOWN_ARTIST);
        assert_eq!(event.album_image_url, None);
    }

    #[test]
    fn test_stopped_snapshot_shape() {
        let s = PlaybackSnapshot::stopped(Utc::now());
        assert!(!s.is_playing);
        assert!(s.track_id.is_none());
    }
}
