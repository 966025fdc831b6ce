//! Exponential backoff state carried across poll iterations.

use std::time::Duration;

/// Cap on the exponent so the multiplier cannot overflow.
const MAX_EXPONENT: u32 = 10;

/// Explicit backoff state machine: current failure count, base interval,
/// and ceiling. The scheduler feeds it failures and clean iterations instead
/// of relying on implicit loop continuation.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    #[must_use]
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
        }
    }

    /// Count one failed iteration and return the delay to sleep before the
    /// next attempt: `min(base * 2^failures, max)`.
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.delay()
    }

    /// The delay implied by the current failure count.
    #[must_use]
    pub fn delay(&self) -> Duration {
        let base_ms = u64::try_from(self.base.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        let factor = 2_u64.saturating_pow(self.failures.min(MAX_EXPONENT));
        Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
    }

    /// An iteration completed without error; fall back to the base interval.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures recorded since the last clean iteration.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }
}
