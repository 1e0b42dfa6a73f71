// SPDX-License-Identifier: MIT
//! Per-conversation fulfillment pipeline.
//!
//! Pure business logic over data fetched through the marketplace client:
//! classify the conversation, run the idempotency and duplicate-reply
//! guards, allocate a code and reply. Every step's failure is handled
//! locally and degrades to the best available error notification — a broken
//! conversation never aborts its siblings in the same poll cycle.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::allocator::{Allocation, CodeAllocator};
use crate::marketplace::types::{ChatMessage, InboxEntry, PURCHASE_FINALIZED};
use crate::marketplace::MarketplaceClient;
use crate::notify::{FulfillmentEvent, NotificationDispatcher};
use crate::text::normalize;

/// Reply used when a finalized purchase matches no configured offer.
pub const GENERIC_FALLBACK_REPLY: &str =
    "Thank you for your purchase! Your item will be sent within a few hours at most.";

pub struct ConversationProcessor {
    client: Arc<dyn MarketplaceClient>,
    allocator: CodeAllocator,
    dispatcher: NotificationDispatcher,
}

impl ConversationProcessor {
    pub fn new(
        client: Arc<dyn MarketplaceClient>,
        allocator: CodeAllocator,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            client,
            allocator,
            dispatcher,
        }
    }

    /// Run the full pipeline for one inbox entry. Never returns an error —
    /// all failure modes end in a notification and a log line.
    pub async fn process(&self, entry: &InboxEntry) {
        let conversation_id = entry.id.as_str();
        let user_name = entry.subject.participant_name.as_str();
        let item_title = entry.subject.first_item_title.as_str();
        info!(conversation_id, from = user_name, "processing conversation");

        let event = || FulfillmentEvent::new(conversation_id, user_name);

        // Full history; an empty conversation is a no-op.
        let messages = match self.client.list_messages(conversation_id).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(conversation_id, err = %e, "failed to read conversation messages");
                self.dispatcher
                    .notify_event(
                        &event()
                            .with_offer(item_title)
                            .with_error(format!("failed to read conversation messages: {e}")),
                    )
                    .await;
                return;
            }
        };
        if messages.is_empty() {
            debug!(conversation_id, "conversation has no messages");
            return;
        }

        // Best-effort: mark the latest message read. Failure never fails the pipeline.
        if let Some(last) = messages.last() {
            if let Err(e) = self.client.mark_read(&last.id).await {
                debug!(conversation_id, err = %e, "mark-as-read failed (ignored)");
            }
        }

        // A conversation counts as a purchase iff the history carries the
        // finalized-transaction marker.
        let finalized = messages.iter().any(|m| m.kind == PURCHASE_FINALIZED);
        debug!(conversation_id, finalized, "classified conversation");
        if !finalized {
            self.dispatcher.notify_event(&event()).await;
            return;
        }

        // Idempotency guard: a conversation that already holds codes is never
        // allocated a second one.
        match self
            .allocator
            .allocations_for_conversation(conversation_id)
            .await
        {
            Ok(codes) if !codes.is_empty() => {
                debug!(conversation_id, "conversation already has codes assigned");
                self.dispatcher
                    .notify_event(
                        &event()
                            .with_offer(item_title)
                            .with_error("already has codes assigned, but found new message"),
                    )
                    .await;
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(conversation_id, err = %e, "idempotency check failed");
                self.dispatcher
                    .notify_event(
                        &event()
                            .with_offer(item_title)
                            .with_error(format!("idempotency check failed: {e}")),
                    )
                    .await;
                return;
            }
        }

        // Resolve the offer from the purchased item's title.
        let offer = match self.allocator.find_offer_by_title(item_title).await {
            Ok(Some(offer)) => offer,
            Ok(None) => {
                warn!(conversation_id, item_title, "no matching offer found");
                if let Err(e) = self
                    .client
                    .send_message(conversation_id, GENERIC_FALLBACK_REPLY)
                    .await
                {
                    warn!(conversation_id, err = %e, "failed to send generic fallback reply");
                }
                self.dispatcher
                    .notify_event(
                        &event()
                            .with_offer(item_title)
                            .with_error("no code offer found"),
                    )
                    .await;
                return;
            }
            Err(e) => {
                warn!(conversation_id, err = %e, "offer lookup failed");
                self.dispatcher
                    .notify_event(
                        &event()
                            .with_offer(item_title)
                            .with_error(format!("offer lookup failed: {e}")),
                    )
                    .await;
                return;
            }
        };

        // Duplicate-reply guard: a crash/retry must not re-send the code.
        if correct_message_already_sent(&messages, &offer.message_correct) {
            debug!(conversation_id, "correct message was already sent");
            self.dispatcher
                .notify_event(
                    &event()
                        .with_offer(offer.title.as_str())
                        .with_error("correct message was already sent"),
                )
                .await;
            return;
        }

        match self.allocator.allocate(conversation_id, &offer).await {
            Ok(Allocation::Fulfilled { message, code }) => {
                if let Err(e) = self.client.send_message(conversation_id, &message).await {
                    // The code stays reserved — no compensating rollback. The
                    // operator gets the code in the notification instead.
                    warn!(conversation_id, code = %code, err = %e, "code reserved but reply failed");
                    self.dispatcher
                        .notify_event(
                            &event()
                                .with_offer(offer.title.as_str())
                                .with_code(code.clone())
                                .with_error(format!("code reserved but reply failed: {e}")),
                        )
                        .await;
                    return;
                }
                info!(conversation_id, code = %code, "fulfilled purchase");
                self.dispatcher
                    .notify_event(&event().with_offer(offer.title.as_str()).with_code(code))
                    .await;
            }
            Ok(Allocation::Exhausted { message }) => {
                warn!(conversation_id, offer = %offer.title, "inventory exhausted");
                if let Err(e) = self.client.send_message(conversation_id, &message).await {
                    warn!(conversation_id, err = %e, "failed to send exhaustion reply");
                    self.dispatcher
                        .notify_event(
                            &event()
                                .with_offer(offer.title.as_str())
                                .with_error(format!("inventory exhausted and reply failed: {e}")),
                        )
                        .await;
                    return;
                }
                self.dispatcher
                    .notify_event(&event().with_offer(offer.title.as_str()))
                    .await;
            }
            Err(e) => {
                warn!(conversation_id, err = %e, "failed to allocate unique code");
                self.dispatcher
                    .notify_event(
                        &event()
                            .with_offer(offer.title.as_str())
                            .with_error(format!("failed to allocate unique code: {e}")),
                    )
                    .await;
            }
        }
    }
}

/// True when any historical message body already contains the offer's
/// canonical correct-message (both sides normalized).
pub fn correct_message_already_sent(messages: &[ChatMessage], message_correct: &str) -> bool {
    let canonical = normalize(message_correct);
    if canonical.is_empty() {
        return false;
    }
    messages
        .iter()
        .filter_map(|m| m.body())
        .any(|body| normalize(body).contains(&canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::types::MessageContent;

    fn text_message(body: &str) -> ChatMessage {
        ChatMessage {
            id: "m1".to_string(),
            kind: "text".to_string(),
            content: Some(MessageContent {
                body: Some(body.to_string()),
            }),
        }
    }

    #[test]
    fn detects_sent_message_despite_case_and_whitespace() {
        let history = vec![text_message(
            "Thank you for your purchase! Code: ABC-123.   ENJOY  your game!",
        )];
        assert!(correct_message_already_sent(&history, "enjoy your game!"));
    }

    #[test]
    fn no_match_when_history_differs() {
        let history = vec![text_message("hello, is this still available?")];
        assert!(!correct_message_already_sent(&history, "Enjoy your game!"));
    }

    #[test]
    fn empty_canonical_never_matches() {
        let history = vec![text_message("anything at all")];
        assert!(!correct_message_already_sent(&history, "   "));
    }

    #[test]
    fn bodyless_messages_are_skipped() {
        let history = vec![ChatMessage {
            id: "m1".to_string(),
            kind: "buy_now_transaction_finalized".to_string(),
            content: None,
        }];
        assert!(!correct_message_already_sent(&history, "Enjoy!"));
    }
}
