//! The ingestion loop: sample, detect transitions, persist.

use crate::backoff::Backoff;
use crate::config::TrackerConfig;
use crate::detector::{ChangeDetector, Decision};
use crate::error::SourceError;
use crate::event::{PlayEvent, PlaybackSnapshot};
use crate::source::PlaybackSource;
use crate::store::EventStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Run change-detector eviction once every this many loop iterations
/// (roughly hourly at the default poll interval).
const EVICTION_EVERY_ITERATIONS: u64 = 360;

/// The system's only long-lived task.
///
/// Each iteration walks `AWAIT_CREDENTIAL -> SAMPLE -> DECIDE -> WRITE ->
/// SLEEP`; the loop terminates only on cancellation. Exactly one poller runs
/// per process - the change detector's state is owned here and never shared.
pub struct Poller {
    source: Arc<dyn PlaybackSource>,
    store: EventStore,
    poll_interval: Duration,
    idle_interval: Duration,
    detector_ttl: Duration,
    max_backoff: Duration,
    cancel_token: CancellationToken,
}

impl Poller {
    /// Create a new poller.
    ///
    /// # Arguments
    /// * `source` - Playback source to sample
    /// * `store` - Event store transitions are written through
    /// * `config` - Poll/idle intervals, detector TTL, backoff ceiling
    /// * `cancel_token` - Optional external cancellation token for graceful shutdown
    #[must_use]
    pub fn new(
        source: Arc<dyn PlaybackSource>,
        store: EventStore,
        config: &TrackerConfig,
        cancel_token: Option<CancellationToken>,
    ) -> Self {
        Self {
            source,
            store,
            poll_interval: config.poll_interval(),
            idle_interval: config.idle_interval(),
            detector_ttl: config.detector_ttl(),
            max_backoff: config.max_backoff(),
            cancel_token: cancel_token.unwrap_or_default(),
        }
    }

    /// Start polling in a background task.
    #[must_use]
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drive the loop until the cancellation token fires. Never returns an
    /// error: a single bad iteration backs off and continues.
    pub async fn run(self) {
        info!(source = self.source.name(), "starting playback poller");

        let mut detector = ChangeDetector::new(self.detector_ttl);
        let mut backoff = Backoff::new(self.poll_interval, self.max_backoff);
        let mut iterations: u64 = 0;

        loop {
            if self.cancel_token.is_cancelled() {
                break;
            }

            let sleep_for = self.poll_iteration(&mut detector, &mut backoff).await;

            iterations = iterations.wrapping_add(1);
            if iterations % EVICTION_EVERY_ITERATIONS == 0 {
                let evicted = detector.evict_expired(Instant::now());
                if evicted > 0 {
                    debug!(evicted, "evicted stale change-detector entries");
                }
            }

            tokio::select! {
                () = self.cancel_token.cancelled() => break,
                () = tokio::time::sleep(sleep_for) => {}
            }
        }

        info!("playback poller shut down gracefully");
    }

    /// One `AWAIT_CREDENTIAL -> SAMPLE -> DECIDE -> WRITE` pass. Returns how
    /// long to sleep before the next pass.
    async fn poll_iteration(&self, detector: &mut ChangeDetector, backoff: &mut Backoff) -> Duration {
        match self.source.ensure_credential().await {
            Ok(()) => {}
            Err(SourceError::NoCredential) => {
                // Not an error: the user simply has not authenticated yet.
                debug!("no credential cached, waiting for user authentication");
                return self.idle_interval;
            }
            Err(e @ SourceError::RefreshRejected { .. }) => {
                warn!(error = %e, "credential refresh rejected; user may need to re-authenticate");
                return backoff.record_failure();
            }
            Err(e) => {
                warn!(error = %e, "credential check failed");
                return backoff.record_failure();
            }
        }

        let user_id = match self.source.identity().await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "failed to resolve polled identity");
                return backoff.record_failure();
            }
        };

        let snapshot = match self.source.current_playback().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(failures = backoff.failures() + 1, error = %e, "playback sample failed");
                return backoff.record_failure();
            }
        };
        backoff.reset();

        // No active device reads the same as a stopped sample.
        let snapshot = snapshot.unwrap_or_else(|| PlaybackSnapshot::stopped(Utc::now()));

        if detector.observe(&user_id, &snapshot, Instant::now()) == Decision::Record {
            if let Some(event) = PlayEvent::from_snapshot(&user_id, &snapshot, snapshot.observed_at)
            {
                match self.store.append(event).await {
                    Ok(stored) => {
                        info!(track = %stored.track_name, artist = %stored.artist_name, "recorded play");
                    }
                    Err(e) => {
                        // Accepted data-loss mode: this transition is dropped,
                        // the next distinct one is still captured.
                        error!(error = %e, "failed to persist play event, transition dropped");
                    }
                }
            }
        }

        self.poll_interval
    }
}
