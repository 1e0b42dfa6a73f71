// SPDX-License-Identifier: MIT
//! Marketplace chat client.
//!
//! The trait is the seam the processor and poller depend on; the production
//! implementation ([`HttpMarketplaceClient`]) is a thin `reqwest` wrapper and
//! tests substitute in-memory fakes.

pub mod http;
pub mod types;

pub use http::HttpMarketplaceClient;

use async_trait::async_trait;
use types::{ChatMessage, InboxEntry};

#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("transport error calling {endpoint}: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected status {status} from {endpoint}")]
    Status { status: u16, endpoint: &'static str },
    #[error("malformed response from {endpoint}: {detail}")]
    Malformed {
        endpoint: &'static str,
        detail: String,
    },
}

/// The four marketplace operations the pipeline consumes.
///
/// Every call carries the current cookie header and a fixed request timeout;
/// non-2xx is surfaced as [`MarketplaceError::Status`].
#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    /// Fetch one page of inbox conversation entries.
    async fn list_inbox(
        &self,
        page_size: u32,
        page: u32,
    ) -> Result<Vec<InboxEntry>, MarketplaceError>;

    /// Fetch the full message history of a conversation.
    async fn list_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ChatMessage>, MarketplaceError>;

    /// Post a text reply into a conversation.
    async fn send_message(
        &self,
        conversation_id: &str,
        body: &str,
    ) -> Result<(), MarketplaceError>;

    /// Mark a single message as read.
    async fn mark_read(&self, message_id: &str) -> Result<(), MarketplaceError>;
}
