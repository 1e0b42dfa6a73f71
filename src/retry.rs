// SPDX-License-Identifier: MIT
//! Bounded retry with linear backoff for transactional units.
//!
//! Provides [`retry_linear`] — a generic async helper that retries a fallible
//! operation with linearly increasing delays between attempts. The allocator
//! wraps its whole allocation transaction in this, so a transient database
//! conflict is retried as a unit rather than inside an open transaction.

use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for [`retry_linear`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first try).
    ///
    /// Default: 3
    pub max_attempts: u32,
    /// Base delay unit. The wait after attempt `n` is `base_delay × n`.
    ///
    /// Default: 100 ms
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Config suitable for quick unit tests (no real waiting).
    pub fn instant() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    /// Delay before the attempt following attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Retry an async operation with linear backoff.
///
/// Calls `f()` up to `policy.max_attempts` times. After a failed attempt `n`
/// the helper sleeps for `base_delay × n` before trying again. Returns
/// `Ok(value)` on the first success, or `Err(last_error)` once all attempts
/// are exhausted.
///
/// # Panics
/// Panics if `policy.max_attempts` is 0 (would never attempt the operation).
pub async fn retry_linear<F, Fut, T, E>(policy: &RetryPolicy, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
{
    assert!(
        policy.max_attempts > 0,
        "RetryPolicy.max_attempts must be at least 1"
    );

    let mut last_err: Option<E> = None;

    for attempt in 1..=policy.max_attempts {
        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "retry succeeded");
                }
                return Ok(value);
            }
            Err(e) => {
                if attempt < policy.max_attempts {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        attempt,
                        max = policy.max_attempts,
                        delay_ms = delay.as_millis(),
                        err = ?e,
                        "attempt failed — retrying"
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    warn!(
                        attempt,
                        max = policy.max_attempts,
                        err = ?e,
                        "all retry attempts exhausted"
                    );
                    last_err = Some(e);
                }
            }
        }
    }

    Err(last_err.expect("retry loop ended without setting last_err"))
}
