// SPDX-License-Identifier: MIT
//! Scheduled inbox polling.
//!
//! One periodic driver: fetch a page of inbox entries, filter to unseen
//! buyer threads, fan each out to the conversation processor as its own
//! task. Consecutive fetch failures feed the trip breaker; at the threshold
//! the schedule stops and a critical notification goes out. Restarting is an
//! explicit operator action.
//!
//! A single-flight guard skips a tick while the previous cycle is still in
//! flight, so one conversation is never dispatched by two overlapping
//! cycles.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::breaker::{BreakerState, TripBreaker};
use crate::marketplace::types::PARTICIPANT_USER;
use crate::marketplace::{MarketplaceClient, MarketplaceError};
use crate::notify::NotificationDispatcher;
use crate::processor::ConversationProcessor;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Registry key and breaker name for this marketplace integration.
    pub provider_name: String,
    /// Poll cadence.
    ///
    /// Default: 60 s
    pub interval: Duration,
    /// Inbox page size fetched per cycle.
    ///
    /// Default: 20
    pub page_size: u32,
    /// Consecutive failed cycles before the breaker trips.
    ///
    /// Default: 5
    pub failure_threshold: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            provider_name: "lokalnie".to_string(),
            interval: Duration::from_secs(60),
            page_size: 20,
            failure_threshold: 5,
        }
    }
}

pub struct InboxPoller {
    client: Arc<dyn MarketplaceClient>,
    processor: Arc<ConversationProcessor>,
    dispatcher: NotificationDispatcher,
    breaker: TripBreaker,
    config: PollerConfig,
    /// Single-flight guard — held for the duration of one cycle.
    cycle_guard: Mutex<()>,
    /// Handle of the running schedule task, if any.
    schedule: Mutex<Option<JoinHandle<()>>>,
}

impl InboxPoller {
    pub fn new(
        client: Arc<dyn MarketplaceClient>,
        processor: Arc<ConversationProcessor>,
        dispatcher: NotificationDispatcher,
        config: PollerConfig,
    ) -> Self {
        let breaker = TripBreaker::new(config.provider_name.clone(), config.failure_threshold);
        Self {
            client,
            processor,
            dispatcher,
            breaker,
            config,
            cycle_guard: Mutex::new(()),
            schedule: Mutex::new(None),
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.config.provider_name
    }

    pub fn breaker(&self) -> &TripBreaker {
        &self.breaker
    }

    /// Start the poll schedule. A no-op if already running.
    pub async fn start(self: &Arc<Self>) {
        let mut schedule = self.schedule.lock().await;
        if schedule.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!(provider = %self.config.provider_name, "poll schedule already running");
            return;
        }

        let poller = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poller.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            interval.tick().await; // consume the immediate first tick
            loop {
                interval.tick().await;
                poller.run_cycle().await;
                if poller.breaker.state().await == BreakerState::Tripped {
                    break;
                }
            }
            info!(provider = %poller.config.provider_name, "poll schedule stopped");
        });
        *schedule = Some(handle);
        info!(
            provider = %self.config.provider_name,
            interval_secs = self.config.interval.as_secs(),
            "poll schedule started"
        );
    }

    /// Stop the poll schedule without touching the breaker.
    pub async fn stop(&self) {
        let mut schedule = self.schedule.lock().await;
        if let Some(handle) = schedule.take() {
            handle.abort();
            info!(provider = %self.config.provider_name, "poll schedule aborted");
        }
    }

    /// Explicit external restart: resets the breaker and resumes polling.
    pub async fn restart(self: &Arc<Self>) {
        self.stop().await;
        self.breaker.reset().await;
        self.start().await;
    }

    /// Run one guarded poll cycle with breaker accounting.
    ///
    /// Skips (without touching the breaker) when the previous cycle is still
    /// in flight.
    pub async fn run_cycle(&self) {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            debug!(provider = %self.config.provider_name, "previous cycle still in flight — skipping tick");
            return;
        };

        if self.breaker.state().await == BreakerState::Tripped {
            return;
        }

        match self.poll_once().await {
            Ok(dispatched) => {
                if dispatched > 0 {
                    info!(count = dispatched, "processed new conversations");
                }
                self.breaker.record_success().await;
            }
            Err(e) => {
                warn!(err = %e, "failed to check inbox");
                if self.breaker.record_failure().await {
                    let message = format!(
                        "Provider {} stopped: inbox check failed {} times in a row (last error: {e})",
                        self.config.provider_name, self.config.failure_threshold
                    );
                    self.dispatcher
                        .notify(&message, &["marketplace", "critical"])
                        .await;
                }
            }
        }
    }

    /// One inbox fetch + fan-out. Per-conversation failures are handled
    /// inside the processor and never surface here — only the fetch itself
    /// can fail a cycle.
    pub async fn poll_once(&self) -> Result<usize, MarketplaceError> {
        let entries = self.client.list_inbox(self.config.page_size, 1).await?;
        debug!(count = entries.len(), "fetched inbox page");

        let fresh: Vec<_> = entries
            .into_iter()
            .filter(|entry| entry.is_unseen && entry.subject.participant_type == PARTICIPANT_USER)
            .collect();

        if fresh.is_empty() {
            debug!("no new conversations");
            return Ok(0);
        }

        let dispatched = fresh.len();
        let tasks: Vec<JoinHandle<()>> = fresh
            .into_iter()
            .map(|entry| {
                let processor = Arc::clone(&self.processor);
                tokio::spawn(async move {
                    processor.process(&entry).await;
                })
            })
            .collect();

        // Conversations run concurrently; the cycle holds the single-flight
        // guard until all of them settle. A panicked task is logged and
        // dropped — it must not take the cycle down.
        for task in tasks {
            if let Err(e) = task.await {
                warn!(err = %e, "conversation task aborted");
            }
        }

        Ok(dispatched)
    }
}
