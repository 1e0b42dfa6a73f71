//! ntfy.sh notification channel — plain POST with a `Tags` header.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::NotifyChannel;

pub struct NtfyChannel {
    http: reqwest::Client,
    url: String,
}

impl NtfyChannel {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotifyChannel for NtfyChannel {
    fn name(&self) -> &str {
        "ntfy"
    }

    async fn send(&self, message: &str, tags: &[&str]) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .header("Tags", tags.join(","))
            .body(message.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("ntfy responded with status {status}"));
        }
        Ok(())
    }
}
