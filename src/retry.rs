//! Retry policy for transient transport failures
//!
//! NCBI E-utilities occasionally answer with 5xx or 429 responses, or drop
//! connections under load. Requests are retried with exponential backoff and
//! jitter; errors that cannot succeed on a second attempt are returned at once.

use std::future::Future;
use std::time::Duration;

use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

/// Classification of errors for retry purposes
pub trait RetryableError {
    /// Whether another attempt could plausibly succeed
    fn is_retryable(&self) -> bool;

    /// Short human-readable reason, used in logs
    fn retry_reason(&self) -> &str;
}

/// Configuration for retrying transient failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Number of retries after the first attempt
    pub max_retries: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Add random jitter to each delay
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        // Five attempts in total, starting around three seconds apart
        Self {
            max_retries: 4,
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(30),
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable retries entirely
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Delays between consecutive attempts
    pub(crate) fn delays(&self) -> Vec<Duration> {
        let base_millis = (self.initial_delay.as_millis() as u64).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(base_millis / 2 + 1)
            .max_delay(self.max_delay)
            .take(self.max_retries)
            .map(|delay| if self.use_jitter { jitter(delay) } else { delay })
            .collect()
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the configured number of retries is exhausted.
pub async fn with_retry<F, Fut, T, E>(
    mut operation: F,
    config: &RetryConfig,
    operation_name: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 0usize;
    let max_attempts = config.max_retries + 1;

    RetryIf::spawn(
        config.delays(),
        || {
            attempt += 1;
            debug!(attempt, max_attempts, "{} attempt", operation_name);
            operation()
        },
        |err: &E| {
            let retryable = err.is_retryable();
            if retryable {
                warn!(
                    reason = err.retry_reason(),
                    error = %err,
                    "{} failed, retrying",
                    operation_name
                );
            }
            retryable
        },
    )
    .await
}
