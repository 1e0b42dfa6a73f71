// SPDX-License-Identifier: MIT
//! Best-effort notification fan-out.
//!
//! Notifications are diagnostic, not transactional: dispatch is
//! fire-and-forget across every configured channel, and a failure in one
//! channel is logged and never escalated to the caller or to other channels.

pub mod ntfy;
pub mod telegram;
pub mod template;

pub use ntfy::NtfyChannel;
pub use telegram::TelegramChannel;
pub use template::FulfillmentEvent;

use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// One observability channel (Telegram, ntfy, a test capture, …).
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, message: &str, tags: &[&str]) -> anyhow::Result<()>;
}

/// Fans one event out to every registered channel concurrently.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotifyChannel>>,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Arc<dyn NotifyChannel>>) -> Self {
        Self { channels }
    }

    /// Send `message` with classification `tags` to all channels.
    ///
    /// Always succeeds from the caller's point of view.
    pub async fn notify(&self, message: &str, tags: &[&str]) {
        if self.channels.is_empty() {
            debug!("no notification channels configured — dropping event");
            return;
        }
        let sends = self.channels.iter().map(|channel| async move {
            if let Err(e) = channel.send(message, tags).await {
                warn!(channel = channel.name(), err = %e, "notification channel failed");
            }
        });
        join_all(sends).await;
    }

    /// Render and dispatch a fulfillment event with its own tags.
    pub async fn notify_event(&self, event: &FulfillmentEvent) {
        self.notify(&event.render(), &event.tags()).await;
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("channels", &self.channels.len())
            .finish()
    }
}
