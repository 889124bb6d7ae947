//! Linear retry for feed requests
//!
//! Attempt `n` (1-based) that fails transiently is followed by a wait of
//! `n * base_delay`. There is no jitter and no sharing between callers: two
//! concurrent requests for the same resource each pay the full budget.

use backoff::backoff::Backoff;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::fetcher::FeedError;
use crate::constants::network::{MAX_ATTEMPTS, RETRY_BASE_DELAY_MS};
use crate::metrics::DatasourceMetrics;

/// How many times a request is tried and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS, Duration::from_millis(RETRY_BASE_DELAY_MS))
    }
}

/// `backoff` schedule that grows linearly and stops after `max_attempts`
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    policy: RetryPolicy,
    failed_attempts: u32,
}

impl LinearBackoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failed_attempts: 0,
        }
    }
}

impl Backoff for LinearBackoff {
    fn reset(&mut self) {
        self.failed_attempts = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.failed_attempts += 1;
        if self.failed_attempts >= self.policy.max_attempts {
            None
        } else {
            Some(self.policy.delay_for(self.failed_attempts))
        }
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the policy's
/// attempts are used up. The last error is returned unchanged.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    feed: &str,
    mut operation: F,
) -> Result<T, FeedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FeedError>>,
{
    backoff::future::retry_notify(
        LinearBackoff::new(policy.clone()),
        || {
            let attempt = operation();
            async move {
                attempt.await.map_err(|e| {
                    if e.is_transient() {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        },
        |err: FeedError, delay: Duration| {
            DatasourceMetrics::record_retry(feed);
            warn!(
                "{} request failed: {}. Retrying in {}ms...",
                feed,
                err,
                delay.as_millis()
            );
        },
    )
    .await
}
