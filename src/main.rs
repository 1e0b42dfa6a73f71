use anyhow::{Context as _, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use vendd::{
    allocator::CodeAllocator,
    config::DaemonConfig,
    cookies::CookieJar,
    marketplace::HttpMarketplaceClient,
    notify::{NotificationDispatcher, NotifyChannel, NtfyChannel, TelegramChannel},
    poller::{InboxPoller, PollerConfig},
    processor::ConversationProcessor,
    provider::{PollingProvider, ProviderRegistry},
    storage::Storage,
};

#[derive(Parser)]
#[command(
    name = "vendd",
    about = "vendd — always-on marketplace code-fulfillment daemon",
    version
)]
struct Args {
    /// Data directory for config and the SQLite database
    #[arg(long, env = "VENDD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "VENDD_LOG")]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = DaemonConfig::new(args.data_dir, args.log);

    // Init once — must happen before any tracing calls.
    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(config.log.as_str())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(config.log.as_str())
            .compact()
            .init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "vendd starting");

    let storage = Storage::open(&config.database.resolve(&config.data_dir))
        .await
        .context("failed to open storage")?;

    // Seed the cookie jar from the persisted provider session; its `enabled`
    // flag decides whether polling starts at all.
    let provider_name = config.marketplace.provider.clone();
    let session = storage
        .provider_session(&provider_name)
        .await?
        .with_context(|| format!("provider session not found for \"{provider_name}\""))?;
    if session.cookies.is_empty() {
        anyhow::bail!("no cookies found in provider session \"{provider_name}\"");
    }

    let jar = CookieJar::new();
    jar.set_all(session.cookies.clone()).await;
    info!(provider = %provider_name, cookies = jar.len().await, "session loaded");

    let client: Arc<HttpMarketplaceClient> = Arc::new(HttpMarketplaceClient::new(
        config.marketplace.base_url.clone(),
        jar,
        std::time::Duration::from_secs(config.marketplace.request_timeout_secs),
    )?);

    let mut channels: Vec<Arc<dyn NotifyChannel>> = Vec::new();
    if let Some((token, chat_id)) = config.telegram.credentials() {
        channels.push(Arc::new(TelegramChannel::new(token, chat_id)?));
    }
    if let Some(url) = config.ntfy.url() {
        channels.push(Arc::new(NtfyChannel::new(url)?));
    }
    if channels.is_empty() {
        warn!("no notification channels configured — events will only be logged");
    }
    let dispatcher = NotificationDispatcher::new(channels);

    let allocator = CodeAllocator::new(storage.pool());
    let processor = Arc::new(ConversationProcessor::new(
        client.clone(),
        allocator,
        dispatcher.clone(),
    ));

    let poller = Arc::new(InboxPoller::new(
        client.clone(),
        processor,
        dispatcher,
        PollerConfig {
            provider_name: provider_name.clone(),
            interval: std::time::Duration::from_secs(config.marketplace.poll_interval_secs),
            page_size: config.marketplace.page_size,
            ..PollerConfig::default()
        },
    ));

    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(PollingProvider::new(poller.clone(), client)));
    registry
        .get(&provider_name)
        .context("provider registry misconfigured")?;

    if session.enabled {
        poller.start().await;
    } else {
        info!(provider = %provider_name, "provider disabled in session config — not polling");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");
    poller.stop().await;

    Ok(())
}
