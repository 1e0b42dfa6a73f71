// SPDX-License-Identifier: MIT
//! Circuit breaker for the inbox polling loop.
//!
//! Keyed on *consecutive* failed poll cycles, not per-conversation failures.
//! When the failure count reaches the threshold the breaker latches into
//! `Tripped` and the poll schedule stops. There is no automatic recovery —
//! a tripped breaker stays tripped until an operator calls [`TripBreaker::reset`]
//! (exposed through the poller's `restart`).
//!
//! # State machine
//!
//! ```text
//! Running ──(threshold consecutive failures)──► Tripped
//!    ▲                                             │
//!    └──────────────(manual reset)─────────────────┘
//! ```

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Observable state of the poll breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation — poll cycles run on schedule.
    Running,
    /// Latched after too many consecutive failures — polling is stopped.
    Tripped,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerState::Running => write!(f, "running"),
            BreakerState::Tripped => write!(f, "tripped"),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
}

/// Thread-safe trip latch.
///
/// Cheaply cloneable — all clones share the same internal state via `Arc`.
#[derive(Clone)]
pub struct TripBreaker {
    inner: Arc<RwLock<BreakerInner>>,
    threshold: u32,
    name: Arc<str>,
}

impl TripBreaker {
    /// Create a breaker that trips after `threshold` consecutive failures.
    ///
    /// Starts in the `Running` state with a zero failure count.
    pub fn new(name: impl Into<String>, threshold: u32) -> Self {
        Self {
            inner: Arc::new(RwLock::new(BreakerInner {
                state: BreakerState::Running,
                failure_count: 0,
            })),
            threshold,
            name: Arc::from(name.into().as_str()),
        }
    }

    /// Record a failed poll cycle.
    ///
    /// Returns `true` exactly once: on the failure that trips the breaker.
    /// Subsequent failures while tripped return `false`.
    pub async fn record_failure(&self) -> bool {
        let mut inner = self.inner.write().await;
        if inner.state == BreakerState::Tripped {
            return false;
        }
        inner.failure_count += 1;
        warn!(
            breaker = %self.name,
            failures = inner.failure_count,
            threshold = self.threshold,
            "poll cycle failed"
        );
        if inner.failure_count >= self.threshold {
            warn!(breaker = %self.name, "circuit breaker → Tripped (threshold reached)");
            inner.state = BreakerState::Tripped;
            return true;
        }
        false
    }

    /// Record a successful poll cycle — resets the failure count to 0.
    pub async fn record_success(&self) {
        let mut inner = self.inner.write().await;
        if inner.state == BreakerState::Running && inner.failure_count > 0 {
            info!(breaker = %self.name, "poll recovered — failure count reset");
        }
        if inner.state == BreakerState::Running {
            inner.failure_count = 0;
        }
    }

    /// Manually reset the breaker: clears the count and resumes `Running`.
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        if inner.state == BreakerState::Tripped {
            info!(breaker = %self.name, "circuit breaker manually reset → Running");
        }
        inner.state = BreakerState::Running;
        inner.failure_count = 0;
    }

    /// Return the current state.
    pub async fn state(&self) -> BreakerState {
        self.inner.read().await.state
    }

    /// Return the current consecutive-failure count.
    pub async fn failure_count(&self) -> u32 {
        self.inner.read().await.failure_count
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for TripBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripBreaker")
            .field("name", &self.name)
            .field("threshold", &self.threshold)
            .finish()
    }
}
