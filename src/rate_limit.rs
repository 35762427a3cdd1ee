//! Politeness pacing for NCBI detail fetches
//!
//! The harvester is strictly sequential, so there is no token bucket: the
//! caller blocks for a fixed interval after every detail request.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, instrument};

/// Fixed-interval pacer applied after each detail fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiter {
    interval: Duration,
}

impl RateLimiter {
    /// Create a pacer that waits `interval` after every request
    ///
    /// # Examples
    ///
    /// ```
    /// use pubmed_harvester::RateLimiter;
    /// use std::time::Duration;
    ///
    /// let limiter = RateLimiter::new(Duration::from_secs(3));
    /// assert_eq!(limiter.interval(), Duration::from_secs(3));
    /// ```
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// NCBI fair-use interval between detail fetches (3 seconds)
    pub fn ncbi_default() -> Self {
        Self::new(crate::config::DEFAULT_FETCH_DELAY)
    }

    /// No waiting at all; intended for tests against a mock server
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block for the configured interval
    #[instrument(skip(self))]
    pub async fn pause(&self) {
        if self.interval.is_zero() {
            return;
        }
        debug!(wait_ms = self.interval.as_millis() as u64, "Waiting before next request");
        sleep(self.interval).await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::ncbi_default()
    }
}
