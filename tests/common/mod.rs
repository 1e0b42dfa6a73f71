//! Shared test doubles: an in-memory marketplace and a capturing
//! notification channel.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use vendd::marketplace::types::{ChatMessage, InboxEntry, InboxSubject, MessageContent};
use vendd::marketplace::{MarketplaceClient, MarketplaceError};
use vendd::notify::NotifyChannel;

pub fn entry(id: &str, user: &str, title: &str) -> InboxEntry {
    InboxEntry {
        id: id.to_string(),
        is_unseen: true,
        subject: InboxSubject {
            participant_name: user.to_string(),
            participant_type: "User".to_string(),
            first_item_title: title.to_string(),
        },
    }
}

pub fn system_entry(id: &str) -> InboxEntry {
    let mut e = entry(id, "Marketplace", "newsletter");
    e.subject.participant_type = "AllegroLokalnie".to_string();
    e
}

pub fn message(id: &str, kind: &str, body: Option<&str>) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        kind: kind.to_string(),
        content: body.map(|b| MessageContent {
            body: Some(b.to_string()),
        }),
    }
}

/// In-memory marketplace: scripted inbox + histories, recorded sends.
#[derive(Default)]
pub struct FakeMarketplace {
    pub inbox: Mutex<Vec<InboxEntry>>,
    pub histories: Mutex<HashMap<String, Vec<ChatMessage>>>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub marked_read: Mutex<Vec<String>>,
    pub fail_inbox: AtomicBool,
    pub fail_send: AtomicBool,
    pub fail_mark_read: AtomicBool,
    pub inbox_calls: AtomicU32,
    /// Artificial latency for `list_inbox`, in milliseconds.
    pub inbox_delay_ms: AtomicU64,
}

impl FakeMarketplace {
    pub fn with_history(self, conversation_id: &str, messages: Vec<ChatMessage>) -> Self {
        self.histories
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), messages);
        self
    }

    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketplaceClient for FakeMarketplace {
    async fn list_inbox(
        &self,
        _page_size: u32,
        _page: u32,
    ) -> Result<Vec<InboxEntry>, MarketplaceError> {
        self.inbox_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.inbox_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.fail_inbox.load(Ordering::SeqCst) {
            return Err(MarketplaceError::Status {
                status: 500,
                endpoint: "chat/inbox",
            });
        }
        Ok(self.inbox.lock().unwrap().clone())
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ChatMessage>, MarketplaceError> {
        Ok(self
            .histories
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        body: &str,
    ) -> Result<(), MarketplaceError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(MarketplaceError::Status {
                status: 500,
                endpoint: "chat/messages (send)",
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), body.to_string()));
        Ok(())
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), MarketplaceError> {
        if self.fail_mark_read.load(Ordering::SeqCst) {
            return Err(MarketplaceError::Status {
                status: 500,
                endpoint: "chat/messages/mark_as_read",
            });
        }
        self.marked_read.lock().unwrap().push(message_id.to_string());
        Ok(())
    }
}

/// Notification channel that records everything it is asked to send.
#[derive(Default)]
pub struct CaptureChannel {
    pub events: Mutex<Vec<(String, Vec<String>)>>,
}

impl CaptureChannel {
    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    pub fn last_tags(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .last()
            .map(|(_, tags)| tags.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotifyChannel for CaptureChannel {
    fn name(&self) -> &str {
        "capture"
    }

    async fn send(&self, message: &str, tags: &[&str]) -> anyhow::Result<()> {
        self.events.lock().unwrap().push((
            message.to_string(),
            tags.iter().map(|t| t.to_string()).collect(),
        ));
        Ok(())
    }
}
