//! Wire types for the marketplace chat API.
//!
//! Field names mirror the marketplace's JSON payloads. Only the fields the
//! pipeline reads are modeled; unknown fields are ignored on deserialize.

use serde::Deserialize;

/// Message type marking a finalized buy-now purchase in the history.
pub const PURCHASE_FINALIZED: &str = "buy_now_transaction_finalized";

/// Participant type of a real buyer (as opposed to system/marketing threads).
pub const PARTICIPANT_USER: &str = "User";

/// One page of the chat inbox.
#[derive(Debug, Clone, Deserialize)]
pub struct InboxResponse {
    pub entries: Vec<InboxEntry>,
}

/// One inbox conversation entry — the transient view the poller filters on.
#[derive(Debug, Clone, Deserialize)]
pub struct InboxEntry {
    pub id: String,
    pub is_unseen: bool,
    pub subject: InboxSubject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboxSubject {
    pub participant_name: String,
    /// `"User"` for buyer threads; anything else is system/marketing.
    pub participant_type: String,
    pub first_item_title: String,
}

/// Full message history of one conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationResponse {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Option<MessageContent>,
}

impl ChatMessage {
    /// Text body, if this message carries one.
    pub fn body(&self) -> Option<&str> {
        self.content.as_ref().and_then(|c| c.body.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageContent {
    pub body: Option<String>,
}

/// Acknowledgement returned when a chat message is posted.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    pub message: SentMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub id: String,
}
