//! Ranked rollup queries over the play event log.
//!
//! Rollups are computed on demand with a single `GROUP BY` pass; nothing is
//! stored besides the events themselves. Groups with equal counts are
//! ordered by the grouping key ascending so results are deterministic.
//! Descriptive fields (names, cover art) come from the first-observed row in
//! each group, pinned via the `MIN(id)` bare-column rule.

use crate::error::Result;
use crate::store::EventStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the by-track rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopTrack {
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub album_name: String,
    pub album_image_url: Option<String>,
    pub play_count: i64,
}

/// One row of the by-artist rollup. The image is the first-observed album
/// art for that artist; the store carries no artist imagery of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopArtist {
    pub artist_name: String,
    pub artist_image_url: Option<String>,
    pub play_count: i64,
}

/// One row of the by-album rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopAlbum {
    pub album_name: String,
    pub artist_name: String,
    pub album_image_url: Option<String>,
    pub play_count: i64,
}

impl EventStore {
    /// Most-played tracks for a user, optionally restricted to plays at or
    /// after `since`, ranked by exact play count descending.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn top_tracks(
        &self,
        user_id: &str,
        limit: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<TopTrack>> {
        let user_id = user_id.to_string();
        let since_ms = since.map(|t| t.timestamp_millis());

        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(
                    r"
                    SELECT track_id, track_name, artist_name, album_name, album_image_url,
                           COUNT(*) AS play_count, MIN(id)
                    FROM play_events
                    WHERE user_id = ?1 AND (?2 IS NULL OR played_at >= ?2)
                    GROUP BY track_id
                    ORDER BY play_count DESC, track_name ASC
                    LIMIT ?3
                ",
                )?;

                let rows = stmt
                    .query_map(rusqlite::params![user_id, since_ms, limit], |row| {
                        Ok(TopTrack {
                            track_id: row.get(0)?,
                            track_name: row.get(1)?,
                            artist_name: row.get(2)?,
                            album_name: row.get(3)?,
                            album_image_url: row.get(4)?,
                            play_count: row.get(5)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(rows)
            })
            .await
            .map_err(Into::into)
    }

    /// Most-played artists for a user, grouped by artist display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn top_artists(
        &self,
        user_id: &str,
        limit: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<TopArtist>> {
        let user_id = user_id.to_string();
        let since_ms = since.map(|t| t.timestamp_millis());

        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(
                    r"
                    SELECT artist_name, album_image_url, COUNT(*) AS play_count, MIN(id)
                    FROM play_events
                    WHERE user_id = ?1 AND (?2 IS NULL OR played_at >= ?2)
                    GROUP BY artist_name
                    ORDER BY play_count DESC, artist_name ASC
                    LIMIT ?3
                ",
                )?;

                let rows = stmt
                    .query_map(rusqlite::params![user_id, since_ms, limit], |row| {
                        Ok(TopArtist {
                            artist_name: row.get(0)?,
                            artist_image_url: row.get(1)?,
                            play_count: row.get(2)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(rows)
            })
            .await
            .map_err(Into::into)
    }

    /// Most-played albums for a user, grouped by album name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn top_albums(
        &self,
        user_id: &str,
        limit: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<TopAlbum>> {
        let user_id = user_id.to_string();
        let since_ms = since.map(|t| t.timestamp_millis());

        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(
                    r"
                    SELECT album_name, artist_name, album_image_url, COUNT(*) AS play_count, MIN(id)
                    FROM play_events
                    WHERE user_id = ?1 AND (?2 IS NULL OR played_at >= ?2)
                    GROUP BY album_name
                    ORDER BY play_count DESC, album_name ASC
                    LIMIT ?3
                ",
                )?;

                let rows = stmt
                    .query_map(rusqlite::params![user_id, since_ms, limit], |row| {
                        Ok(TopAlbum {
                            album_name: row.get(0)?,
                            artist_name: row.get(1)?,
                            album_image_url: row.get(2)?,
                            play_count: row.get(3)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(rows)
            })
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PlayEvent;
    use crate::store::tests::{at, event};

    async fn seeded_store() -> EventStore {
        let store = EventStore::open_in_memory().await.unwrap();
        // x played 3 times, y once.
        for (i, track) in ["x", "x", "x", "y"].iter().enumerate() {
            store
                .append(event("u1", track, at(i as i64 * 60)))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_top_tracks_ranked_by_count() {
        let store = seeded_store().await;
        let top = store.top_tracks("u1", 10, None).await.unwrap();

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].track_id, "x");
        assert_eq!(top[0].play_count, 3);
        assert_eq!(top[1].track_id, "y");
        assert_eq!(top[1].play_count, 1);
    }

    #[tokio::test]
    async fn test_top_tracks_limit() {
        let store = seeded_store().await;
        let top = store.top_tracks("u1", 1, None).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].track_id, "x");
    }

    #[tokio::test]
    async fn test_ties_break_lexicographically() {
        let store = EventStore::open_in_memory().await.unwrap();
        store.append(event("u1", "zeta", at(0))).await.unwrap();
        store.append(event("u1", "alpha", at(60))).await.unwrap();

        let top = store.top_tracks("u1", 10, None).await.unwrap();
        assert_eq!(top[0].play_count, top[1].play_count);
        // Equal counts order by track name ascending, not insertion order.
        assert_eq!(top[0].track_name, "Track alpha");
        assert_eq!(top[1].track_name, "Track zeta");
    }

    #[tokio::test]
    async fn test_since_filter_excludes_older_plays() {
        let store = seeded_store().await;
        // Only the last two plays (x at 120s, y at 180s) survive the cutoff.
        let top = store.top_tracks("u1", 10, Some(at(120))).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].play_count, 1);
        assert_eq!(top[1].play_count, 1);
    }

    #[tokio::test]
    async fn test_top_artists_groups_by_display_name() {
        let store = EventStore::open_in_memory().await.unwrap();
        let mut e = event("u1", "t1", at(0));
        e.artist_name = "Ana".to_string();
        store.append(e).await.unwrap();

        let mut e = event("u1", "t2", at(60));
        e.artist_name = "Ana".to_string();
        store.append(e).await.unwrap();

        let mut e = event("u1", "t3", at(120));
        e.artist_name = "Bo".to_string();
        store.append(e).await.unwrap();

        let top = store.top_artists("u1", 10, None).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].artist_name, "Ana");
        assert_eq!(top[0].play_count, 2);
        assert_eq!(top[1].artist_name, "Bo");
    }

    #[tokio::test]
    async fn test_top_albums() {
        let store = EventStore::open_in_memory().await.unwrap();
        for i in 0..2 {
            let mut e = event("u1", &format!("t{i}"), at(i * 60));
            e.album_name = "First".to_string();
            store.append(e).await.unwrap();
        }
        let mut e = event("u1", "t9", at(300));
        e.album_name = "Second".to_string();
        store.append(e).await.unwrap();

        let top = store.top_albums("u1", 10, None).await.unwrap();
        assert_eq!(top[0].album_name, "First");
        assert_eq!(top[0].play_count, 2);
        assert_eq!(top[1].album_name, "Second");
        assert_eq!(top[1].play_count, 1);
    }

    #[tokio::test]
    async fn test_representative_fields_are_first_observed() {
        let store = EventStore::open_in_memory().await.unwrap();
        let mut first: PlayEvent = event("u1", "t1", at(0));
        first.album_image_url = Some("https://img.example/original.jpg".to_string());
        store.append(first).await.unwrap();

        let mut reissue = event("u1", "t1", at(60));
        reissue.album_image_url = Some("https://img.example/reissue.jpg".to_string());
        store.append(reissue).await.unwrap();

        let top = store.top_tracks("u1", 10, None).await.unwrap();
        assert_eq!(
            top[0].album_image_url.as_deref(),
            Some("https://img.example/original.jpg")
        );
    }

    #[tokio::test]
    async fn test_rollups_are_per_user() {
        let store = EventStore::open_in_memory().await.unwrap();
        store.append(event("u1", "t1", at(0))).await.unwrap();
        store.append(event("u2", "t1", at(60))).await.unwrap();

        let top = store.top_tracks("u1", 10, None).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].play_count, 1);
    }
}
