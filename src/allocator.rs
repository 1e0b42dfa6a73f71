// SPDX-License-Identifier: MIT
//! Transactional code allocation.
//!
//! Guarantees at-most-one-allocation-per-code under concurrency: the
//! SELECT + guarded UPDATE run inside one database transaction, and the
//! UPDATE re-asserts `used = 0 AND conversation_id IS NULL` so a lost race
//! touches zero rows and is retried as a conflict. The storage engine's
//! transaction is the serialization point — no application-level mutex.
//!
//! Inventory exhaustion is not an error: it is a first-class
//! [`Allocation::Exhausted`] outcome carrying the offer's apology message.

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::retry::{retry_linear, RetryPolicy};
use crate::storage::{Code, Offer};
use crate::text::normalize;

/// Terminal outcome of one allocation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allocation {
    /// A code was reserved for the conversation inside a committed transaction.
    Fulfilled { message: String, code: String },
    /// No eligible code row remained for the offer — the polite apology reply.
    Exhausted { message: String },
}

/// Terminal allocation error. Callers must not treat this as "no inventory".
#[derive(Debug, thiserror::Error)]
pub enum AllocatorError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("a concurrent allocation reserved the selected code")]
    Conflict,
    #[error("allocation failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<AllocatorError>,
    },
}

/// Transactional inventory service over the offers/codes tables.
#[derive(Clone)]
pub struct CodeAllocator {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl CodeAllocator {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy (tests use [`RetryPolicy::instant`]).
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Find the active offer matching an inbox item title.
    ///
    /// Matching is case- and whitespace-insensitive: an offer matches when
    /// its normalized title is contained in the normalized item title
    /// ("Premium Voucher" matches "  PREMIUM voucher XL  "). Ties break on
    /// storage order (lowest id).
    pub async fn find_offer_by_title(&self, title: &str) -> Result<Option<Offer>, AllocatorError> {
        let query = normalize(title);
        if query.is_empty() {
            return Ok(None);
        }

        let offers: Vec<Offer> = sqlx::query_as(
            "SELECT id, title, message_correct, message_failed, active
             FROM offers WHERE active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(offers.into_iter().find(|offer| {
            let needle = normalize(&offer.title);
            !needle.is_empty() && query.contains(&needle)
        }))
    }

    /// Idempotency query: all codes already reserved for a conversation.
    pub async fn allocations_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Code>, AllocatorError> {
        let codes: Vec<Code> = sqlx::query_as(
            "SELECT id, value, offer_id, used, conversation_id, message, created_at
             FROM codes WHERE conversation_id = ?1 ORDER BY id",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }

    /// Reserve one unused code of `offer` for `conversation_id`.
    ///
    /// The whole transactional unit is retried up to the policy's attempt
    /// budget with linear backoff; exhausting the budget is a terminal error.
    pub async fn allocate(
        &self,
        conversation_id: &str,
        offer: &Offer,
    ) -> Result<Allocation, AllocatorError> {
        debug!(conversation_id, offer_id = offer.id, "allocating code");

        retry_linear(&self.retry, || self.try_allocate(conversation_id, offer))
            .await
            .map_err(|source| AllocatorError::RetriesExhausted {
                attempts: self.retry.max_attempts,
                source: Box::new(source),
            })
    }

    /// One allocation attempt: a single transaction, committed on success.
    async fn try_allocate(
        &self,
        conversation_id: &str,
        offer: &Offer,
    ) -> Result<Allocation, AllocatorError> {
        let mut tx = self.pool.begin().await?;

        let selected: Option<(i64, String)> = sqlx::query_as(
            "SELECT id, value FROM codes
             WHERE offer_id = ?1 AND used = 0 AND conversation_id IS NULL
             ORDER BY id LIMIT 1",
        )
        .bind(offer.id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((code_id, value)) = selected else {
            tx.rollback().await?;
            warn!(conversation_id, offer_id = offer.id, "no available code found");
            return Ok(Allocation::Exhausted {
                message: compose_failed_message(offer),
            });
        };

        let message = compose_correct_message(&value, offer);

        // The guard re-checks eligibility; zero affected rows means another
        // transaction reserved this code between our snapshot and the write.
        let result = sqlx::query(
            "UPDATE codes SET used = 1, conversation_id = ?1, message = ?2
             WHERE id = ?3 AND used = 0 AND conversation_id IS NULL",
        )
        .bind(conversation_id)
        .bind(&message)
        .bind(code_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AllocatorError::Conflict);
        }

        tx.commit().await?;
        debug!(conversation_id, code = %value, "reserved code");

        Ok(Allocation::Fulfilled {
            message,
            code: value,
        })
    }
}

fn compose_correct_message(code: &str, offer: &Offer) -> String {
    format!(
        "Thank you for your purchase! Code: {code}. {}",
        offer.message_correct
    )
}

fn compose_failed_message(offer: &Offer) -> String {
    format!("Thank you for your purchase! {}", offer.message_failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(title: &str) -> Offer {
        Offer {
            id: 1,
            title: title.to_string(),
            message_correct: "Enjoy!".to_string(),
            message_failed: "Wait a bit.".to_string(),
            active: true,
        }
    }

    #[test]
    fn correct_message_carries_code_and_offer_text() {
        let message = compose_correct_message("ABC-123", &offer("Steam Key 10"));
        assert!(message.contains("ABC-123"));
        assert!(message.ends_with("Enjoy!"));
    }

    #[test]
    fn failed_message_carries_offer_apology() {
        let message = compose_failed_message(&offer("Steam Key 10"));
        assert!(message.ends_with("Wait a bit."));
    }
}
