//! Edge-triggering over polled playback samples.
//!
//! Polling sees the same playing track many times between two actual track
//! changes. The detector keeps O(1) state per user - the last recorded track
//! id and when it was recorded - and converts the sampled level-signal into
//! an edge-triggered stream of "record this play" decisions.

use crate::event::PlaybackSnapshot;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Outcome of observing one playback sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The sample is a new play transition; persist it.
    Record,
    /// Same ongoing play, or nothing playing; do not persist.
    Skip,
}

#[derive(Debug, Clone)]
struct LastPlay {
    track_id: String,
    seen_at: Instant,
}

/// Per-user last-play memory with a time-to-live.
///
/// Owned exclusively by the poll scheduler's single task; the `now` argument
/// is injected so tests can drive time explicitly.
#[derive(Debug)]
pub struct ChangeDetector {
    ttl: Duration,
    entries: HashMap<String, LastPlay>,
}

impl ChangeDetector {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Decide whether a sample constitutes a new play worth recording.
    ///
    /// A stopped or track-less sample evicts the user's entry, so a later
    /// resumption of the same track counts as a new play. An entry older
    /// than the TTL no longer suppresses anything, even if housekeeping has
    /// not reclaimed it yet.
    pub fn observe(&mut self, user_id: &str, snapshot: &PlaybackSnapshot, now: Instant) -> Decision {
        let track_id = if snapshot.is_playing {
            snapshot.track_id.as_deref()
        } else {
            None
        };

        let Some(track_id) = track_id else {
            if self.entries.remove(user_id).is_some() {
                debug!(user_id, "playback stopped, cleared last-play entry");
            }
            return Decision::Skip;
        };

        if let Some(entry) = self.entries.get(user_id) {
            let fresh = now.duration_since(entry.seen_at) <= self.ttl;
            if fresh && entry.track_id == track_id {
                return Decision::Skip;
            }
        }

        self.entries.insert(
            user_id.to_string(),
            LastPlay {
                track_id: track_id.to_string(),
                seen_at: now,
            },
        );
        Decision::Record
    }

    /// Reclaim entries untouched for longer than the TTL; returns how many
    /// were evicted. Bounds memory for users that stop being polled.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.duration_since(entry.seen_at) <= ttl);
        before - self.entries.len()
    }

    /// Number of users currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const TTL: Duration = Duration::from_secs(3600);

    fn playing(track_id: &str) -> PlaybackSnapshot {
        PlaybackSnapshot {
            is_playing: true,
            track_id: Some(track_id.to_string()),
            track_name: track_id.to_uppercase(),
            artist_names: vec!["Artist".to_string()],
            album_name: "Album".to_string(),
            album_image_url: None,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_edge_triggering() {
        let mut detector = ChangeDetector::new(TTL);
        let now = Instant::now();

        // [A, A, A, B, B, A] with no stop records exactly three transitions.
        let samples = ["a", "a", "a", "b", "b", "a"];
        let recorded = samples
            .iter()
            .filter(|id| detector.observe("u1", &playing(id), now) == Decision::Record)
            .count();
        assert_eq!(recorded, 3);
    }

    #[test]
    fn test_stop_resets_state() {
        let mut detector = ChangeDetector::new(TTL);
        let now = Instant::now();

        assert_eq!(detector.observe("u1", &playing("a"), now), Decision::Record);
        let stopped = PlaybackSnapshot::stopped(Utc::now());
        assert_eq!(detector.observe("u1", &stopped, now), Decision::Skip);
        // Same track again after the stop is a new play.
        assert_eq!(detector.observe("u1", &playing("a"), now), Decision::Record);
    }

    #[test]
    fn test_paused_sample_counts_as_stop() {
        let mut detector = ChangeDetector::new(TTL);
        let now = Instant::now();

        assert_eq!(detector.observe("u1", &playing("a"), now), Decision::Record);
        let mut paused = playing("a");
        paused.is_playing = false;
        assert_eq!(detector.observe("u1", &paused, now), Decision::Skip);
        assert!(detector.is_empty());
    }

    #[test]
    fn test_expired_entry_does_not_suppress() {
        let mut detector = ChangeDetector::new(TTL);
        let start = Instant::now();

        assert_eq!(detector.observe("u1", &playing("a"), start), Decision::Record);
        // Unexpired: the same track is still the same ongoing play.
        let later = start + TTL / 2;
        assert_eq!(detector.observe("u1", &playing("a"), later), Decision::Skip);
        // Past the TTL the stale entry no longer suppresses a re-record.
        let expired = start + TTL + Duration::from_secs(1);
        assert_eq!(detector.observe("u1", &playing("a"), expired), Decision::Record);
    }

    #[test]
    fn test_evict_expired() {
        let mut detector = ChangeDetector::new(TTL);
        let start = Instant::now();

        detector.observe("u1", &playing("a"), start);
        detector.observe("u2", &playing("b"), start + TTL / 2);
        assert_eq!(detector.len(), 2);

        let evicted = detector.evict_expired(start + TTL + Duration::from_secs(1));
        assert_eq!(evicted, 1);
        assert_eq!(detector.len(), 1);
    }

    #[test]
    fn test_users_are_independent() {
        let mut detector = ChangeDetector::new(TTL);
        let now = Instant::now();

        assert_eq!(detector.observe("u1", &playing("a"), now), Decision::Record);
        assert_eq!(detector.observe("u2", &playing("a"), now), Decision::Record);
        assert_eq!(detector.observe("u1", &playing("a"), now), Decision::Skip);
    }
}
