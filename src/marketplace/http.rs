//! `reqwest`-backed marketplace client.
//!
//! Each request carries the current cookie jar as a `Cookie` header; each
//! response's `Set-Cookie` values are merged back into the jar before the
//! body is read, so session refreshes survive even failed calls.

use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, SET_COOKIE, USER_AGENT};
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::types::{ConversationResponse, InboxResponse, SendMessageResponse};
use super::{ChatMessage, InboxEntry, MarketplaceClient, MarketplaceError};
use crate::cookies::CookieJar;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub struct HttpMarketplaceClient {
    http: reqwest::Client,
    base_url: String,
    jar: CookieJar,
}

impl HttpMarketplaceClient {
    /// Build a client with the fixed default headers and request timeout.
    pub fn new(base_url: impl Into<String>, jar: CookieJar, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            jar,
        })
    }

    /// Attach the cookie header, send, merge `Set-Cookie`, check status.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &'static str,
    ) -> Result<reqwest::Response, MarketplaceError> {
        let cookie = self.jar.header_string().await;
        let request = if cookie.is_empty() {
            request
        } else {
            request.header(COOKIE, cookie)
        };

        let response = request
            .send()
            .await
            .map_err(|source| MarketplaceError::Transport { endpoint, source })?;

        let set_cookies: Vec<&str> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if !set_cookies.is_empty() {
            self.jar.merge_from_response(set_cookies).await;
        }

        let status = response.status();
        debug!(endpoint, status = status.as_u16(), "marketplace response");
        if !status.is_success() {
            return Err(MarketplaceError::Status {
                status: status.as_u16(),
                endpoint,
            });
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl MarketplaceClient for HttpMarketplaceClient {
    async fn list_inbox(
        &self,
        page_size: u32,
        page: u32,
    ) -> Result<Vec<InboxEntry>, MarketplaceError> {
        const ENDPOINT: &str = "chat/inbox";
        let url = format!(
            "{}/chat/inbox?page_size={page_size}&page={page}",
            self.base_url
        );
        let response = self.execute(self.http.get(url), ENDPOINT).await?;
        let inbox: InboxResponse =
            response
                .json()
                .await
                .map_err(|e| MarketplaceError::Malformed {
                    endpoint: ENDPOINT,
                    detail: e.to_string(),
                })?;
        Ok(inbox.entries)
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ChatMessage>, MarketplaceError> {
        const ENDPOINT: &str = "chat/messages";
        let url = format!(
            "{}/chat/messages?conversation_id={conversation_id}",
            self.base_url
        );
        let response = self.execute(self.http.get(url), ENDPOINT).await?;
        let conversation: ConversationResponse =
            response
                .json()
                .await
                .map_err(|e| MarketplaceError::Malformed {
                    endpoint: ENDPOINT,
                    detail: e.to_string(),
                })?;
        debug!(
            conversation_id,
            count = conversation.messages.len(),
            "read conversation messages"
        );
        Ok(conversation.messages)
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        body: &str,
    ) -> Result<(), MarketplaceError> {
        const ENDPOINT: &str = "chat/messages (send)";
        let url = format!("{}/chat/messages", self.base_url);
        let payload = json!({
            "id": Uuid::new_v4().to_string(),
            "conversation_id": conversation_id,
            "type": "text",
            "content": { "body": body },
        });
        let response = self
            .execute(self.http.post(url).json(&payload), ENDPOINT)
            .await?;
        // The marketplace acks a successful post with the stored message id.
        let ack: SendMessageResponse =
            response
                .json()
                .await
                .map_err(|e| MarketplaceError::Malformed {
                    endpoint: ENDPOINT,
                    detail: e.to_string(),
                })?;
        debug!(conversation_id, message_id = %ack.message.id, "sent message");
        Ok(())
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), MarketplaceError> {
        const ENDPOINT: &str = "chat/messages/mark_as_read";
        let url = format!(
            "{}/chat/messages/{message_id}/mark_as_read",
            self.base_url
        );
        self.execute(self.http.post(url), ENDPOINT).await?;
        Ok(())
    }
}
