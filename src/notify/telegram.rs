//! Telegram notification channel (bot sendMessage API).

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::NotifyChannel;

#[derive(Debug, Deserialize)]
struct TelegramReply {
    ok: bool,
}

pub struct TelegramChannel {
    http: reqwest::Client,
    token: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }
}

#[async_trait]
impl NotifyChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    // Tags are not part of the Telegram API; they ride in the message text only.
    async fn send(&self, message: &str, _tags: &[&str]) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let response = self
            .http
            .post(url)
            .json(&json!({ "chat_id": self.chat_id, "text": message }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("telegram responded with status {status}"));
        }
        let reply: TelegramReply = response.json().await?;
        if !reply.ok {
            return Err(anyhow!("telegram rejected the message (ok=false)"));
        }
        Ok(())
    }
}
