//! The seam between the engine and whatever is being polled.

use crate::error::SourceError;
use crate::event::PlaybackSnapshot;
use async_trait::async_trait;

/// A playback source the poll scheduler samples.
///
/// Implementations own their credential lifecycle: `ensure_credential`
/// transparently refreshes an expiring credential and reports the failure
/// class, so the scheduler can distinguish "user must authenticate" from
/// "upstream flaky". All calls are expected to carry bounded timeouts.
#[async_trait]
pub trait PlaybackSource: Send + Sync {
    /// Short source name for logs.
    fn name(&self) -> &'static str;

    /// Make sure a currently-valid access credential is available,
    /// refreshing it if it is about to expire.
    ///
    /// # Errors
    ///
    /// [`SourceError::NoCredential`] when the user has never authenticated,
    /// [`SourceError::RefreshRejected`] when the refresh was rejected.
    async fn ensure_credential(&self) -> Result<(), SourceError>;

    /// The identity whose playback this source observes.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity cannot be resolved.
    async fn identity(&self) -> Result<String, SourceError>;

    /// Sample what is currently playing; `None` when playback is inactive
    /// on every device.
    ///
    /// # Errors
    ///
    /// Returns an error if the sample request fails.
    async fn current_playback(&self) -> Result<Option<PlaybackSnapshot>, SourceError>;
}
