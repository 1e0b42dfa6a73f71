// SPDX-License-Identifier: MIT
//! Marketplace provider interface and registry.
//!
//! A provider bundles the capabilities one marketplace integration exposes.
//! The registry maps a string key to one registered implementation, looked
//! up at call time; a missing key is a configuration error, never a crash.

use anyhow::Context as _;
use async_trait::async_trait;
use std::sync::Arc;

use crate::marketplace::MarketplaceClient;
use crate::poller::InboxPoller;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no provider registered for key \"{0}\"")]
    Unknown(String),
}

/// Fixed capability set of one marketplace integration.
#[async_trait]
pub trait MarketProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this provider serves the given registry key.
    fn supports(&self, key: &str) -> bool {
        key.eq_ignore_ascii_case(self.name())
    }

    /// Run one inbox check cycle (with breaker accounting).
    async fn check_inbox(&self);

    /// Post a reply into a conversation on this marketplace.
    async fn send_message(&self, conversation_id: &str, body: &str) -> anyhow::Result<()>;
}

impl std::fmt::Debug for dyn MarketProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketProvider")
            .field("name", &self.name())
            .finish()
    }
}

/// String-keyed lookup over the registered providers.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MarketProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn MarketProvider>) {
        self.providers.push(provider);
    }

    pub fn get(&self, key: &str) -> Result<Arc<dyn MarketProvider>, RegistryError> {
        self.providers
            .iter()
            .find(|p| p.supports(key))
            .cloned()
            .ok_or_else(|| RegistryError::Unknown(key.to_string()))
    }

    pub fn providers(&self) -> &[Arc<dyn MarketProvider>] {
        &self.providers
    }
}

/// The poller is the single marketplace integration this daemon ships.
pub struct PollingProvider {
    poller: Arc<InboxPoller>,
    client: Arc<dyn MarketplaceClient>,
}

impl PollingProvider {
    pub fn new(poller: Arc<InboxPoller>, client: Arc<dyn MarketplaceClient>) -> Self {
        Self { poller, client }
    }
}

#[async_trait]
impl MarketProvider for PollingProvider {
    fn name(&self) -> &str {
        self.poller.provider_name()
    }

    async fn check_inbox(&self) {
        self.poller.run_cycle().await;
    }

    async fn send_message(&self, conversation_id: &str, body: &str) -> anyhow::Result<()> {
        self.client
            .send_message(conversation_id, body)
            .await
            .with_context(|| format!("sending message to conversation {conversation_id}"))
    }
}
