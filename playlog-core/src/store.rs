use crate::error::Result;
use crate::event::PlayEvent;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

const SCHEMA_SQL: &str = r"
-- Durable, append-mostly log of play transitions
CREATE TABLE IF NOT EXISTS play_events (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    track_id TEXT NOT NULL,
    track_name TEXT NOT NULL,
    artist_name TEXT NOT NULL,
    album_name TEXT NOT NULL,
    album_image_url TEXT,
    played_at INTEGER NOT NULL,
    UNIQUE(user_id, track_id, played_at)
);

CREATE INDEX IF NOT EXISTS idx_play_events_user_time ON play_events(user_id, played_at);
";

/// SQLite-backed play event store.
///
/// The `(user_id, track_id, played_at)` uniqueness constraint lives in the
/// schema, not the application: two writers observing the same transition
/// cannot produce two rows, with no check-then-insert window.
#[derive(Clone)]
pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    /// Open (and initialize) the store at the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or opened.
    pub async fn new() -> Result<Self> {
        let db_path = crate::paths::history_db_path();
        Self::open(&db_path).await
    }

    /// Open a store at a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub async fn open(path: &Path) -> Result<Self> {
        info!("Opening play history database at {:?}", path);

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).await?;
        Self::init(conn).await
    }

    /// Open an ephemeral in-memory store (used by tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA_SQL)?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            Ok(())
        })
        .await?;

        debug!("Play history database initialized");
        Ok(Self { conn })
    }

    /// Insert-if-absent under the uniqueness constraint, then re-read the
    /// canonical row by key: a concurrent writer may have won the race, and
    /// duplicate keys are absorbed silently rather than raised.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or the read-back fails.
    pub async fn append(&self, event: PlayEvent) -> Result<PlayEvent> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r"
                    INSERT INTO play_events
                        (user_id, track_id, track_name, artist_name, album_name, album_image_url, played_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ON CONFLICT(user_id, track_id, played_at) DO NOTHING
                ",
                    rusqlite::params![
                        event.user_id,
                        event.track_id,
                        event.track_name,
                        event.artist_name,
                        event.album_name,
                        event.album_image_url,
                        event.played_at.timestamp_millis(),
                    ],
                )?;

                let mut stmt = conn.prepare_cached(
                    r"
                    SELECT user_id, track_id, track_name, artist_name, album_name, album_image_url, played_at
                    FROM play_events
                    WHERE user_id = ?1 AND track_id = ?2 AND played_at = ?3
                ",
                )?;

                let stored = stmt.query_row(
                    rusqlite::params![
                        event.user_id,
                        event.track_id,
                        event.played_at.timestamp_millis()
                    ],
                    row_to_event,
                )?;

                Ok(stored)
            })
            .await
            .map_err(Into::into)
    }

    /// Paginated, optionally time-filtered history for one user, newest
    /// first. A pure function of its parameters; no cursor state.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(
        &self,
        user_id: &str,
        skip: u32,
        limit: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PlayEvent>> {
        let user_id = user_id.to_string();
        let since_ms = since.map(|t| t.timestamp_millis());

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(
                    r"
                    SELECT user_id, track_id, track_name, artist_name, album_name, album_image_url, played_at
                    FROM play_events
                    WHERE user_id = ?1 AND (?2 IS NULL OR played_at >= ?2)
                    ORDER BY played_at DESC
                    LIMIT ?3 OFFSET ?4
                ",
                )?;

                let events = stmt
                    .query_map(rusqlite::params![user_id, since_ms, limit, skip], row_to_event)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(events)
            })
            .await
            .map_err(Into::into)
    }

    /// The most recent event for a user, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn latest(&self, user_id: &str) -> Result<Option<PlayEvent>> {
        let user_id = user_id.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(
                    r"
                    SELECT user_id, track_id, track_name, artist_name, album_name, album_image_url, played_at
                    FROM play_events
                    WHERE user_id = ?1
                    ORDER BY played_at DESC
                    LIMIT 1
                ",
                )?;

                let event = stmt
                    .query_row(rusqlite::params![user_id], row_to_event)
                    .optional()?;

                Ok(event)
            })
            .await
            .map_err(Into::into)
    }

    /// Checkpoint WAL for clean shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the WAL checkpoint fails.
    pub async fn checkpoint(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    pub(crate) const fn connection(&self) -> &Connection {
        &self.conn
    }
}

pub(crate) fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlayEvent> {
    Ok(PlayEvent {
        user_id: row.get(0)?,
        track_id: row.get(1)?,
        track_name: row.get(2)?,
        artist_name: row.get(3)?,
        album_name: row.get(4)?,
        album_image_url: row.get(5)?,
        played_at: millis_to_utc(row.get::<_, i64>(6)?),
    })
}

pub(crate) fn millis_to_utc(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn event(user_id: &str, track_id: &str, played_at: DateTime<Utc>) -> PlayEvent {
        PlayEvent {
            user_id: user_id.to_string(),
            track_id: track_id.to_string(),
            track_name: format!("Track {track_id}"),
            artist_name: "Artist".to_string(),
            album_name: "Album".to_string(),
            album_image_url: Some("https://img.example/cover.jpg".to_string()),
            played_at,
        }
    }

    pub(crate) fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_704_067_200 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_append_is_idempotent() {
        let store = EventStore::open_in_memory().await.unwrap();
        let e = event("u1", "t1", at(0));

        let first = store.append(e.clone()).await.unwrap();
        let second = store.append(e.clone()).await.unwrap();
        assert_eq!(first, second);

        let rows = store.list("u1", 0, 10, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], e);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_writers() {
        let store = EventStore::open_in_memory().await.unwrap();
        let e = event("u1", "t1", at(0));

        let (a, b) = tokio::join!(store.append(e.clone()), store.append(e.clone()));
        assert!(a.is_ok());
        assert!(b.is_ok());

        let rows = store.list("u1", 0, 10, None).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_paginated() {
        let store = EventStore::open_in_memory().await.unwrap();
        for i in 0..5 {
            store.append(event("u1", &format!("t{i}"), at(i * 60))).await.unwrap();
        }

        let rows = store.list("u1", 0, 2, None).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].track_id, "t4");
        assert_eq!(rows[1].track_id, "t3");

        let next = store.list("u1", 2, 2, None).await.unwrap();
        assert_eq!(next[0].track_id, "t2");
        assert_eq!(next[1].track_id, "t1");
    }

    #[tokio::test]
    async fn test_list_since_filter() {
        let store = EventStore::open_in_memory().await.unwrap();
        store.append(event("u1", "old", at(0))).await.unwrap();
        store.append(event("u1", "new", at(600))).await.unwrap();

        let rows = store.list("u1", 0, 10, Some(at(300))).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].track_id, "new");

        // The cutoff is inclusive.
        let rows = store.list("u1", 0, 10, Some(at(600))).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_user() {
        let store = EventStore::open_in_memory().await.unwrap();
        store.append(event("u1", "t1", at(0))).await.unwrap();
        store.append(event("u2", "t2", at(60))).await.unwrap();

        let rows = store.list("u1", 0, 10, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "u1");
    }

    #[tokio::test]
    async fn test_latest() {
        let store = EventStore::open_in_memory().await.unwrap();
        assert!(store.latest("u1").await.unwrap().is_none());

        store.append(event("u1", "t1", at(0))).await.unwrap();
        store.append(event("u1", "t2", at(60))).await.unwrap();

        let latest = store.latest("u1").await.unwrap().unwrap();
        assert_eq!(latest.track_id, "t2");
    }

    #[tokio::test]
    async fn test_millis_round_trip() {
        let store = EventStore::open_in_memory().await.unwrap();
        let played_at = at(42);
        store.append(event("u1", "t1", played_at)).await.unwrap();

        let rows = store.list("u1", 0, 1, None).await.unwrap();
        assert_eq!(rows[0].played_at, played_at);
    }
}
