//! Daemon configuration.
//!
//! Layered like the rest of the stack expects: CLI / env vars override the
//! optional `{data_dir}/config.toml`, which overrides built-in defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_BASE_URL: &str = "https://allegrolokalnie.pl/api";
const DEFAULT_PROVIDER: &str = "lokalnie";
const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

// ─── MarketplaceConfig ────────────────────────────────────────────────────────

/// Marketplace integration settings (`[marketplace]` in config.toml).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    /// Chat API base URL.
    pub base_url: String,
    /// Registry key of this integration.
    pub provider: String,
    /// Inbox page size fetched per poll cycle. Default: 20.
    pub page_size: u32,
    /// Poll cadence in seconds. Default: 60.
    pub poll_interval_secs: u64,
    /// Fixed timeout for every outbound HTTP call, in seconds. Default: 10.
    pub request_timeout_secs: u64,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

// ─── DatabaseConfig ───────────────────────────────────────────────────────────

/// Database settings (`[database]` in config.toml).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path. Default: `{data_dir}/vendd.db`.
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Resolve the database path against the data directory.
    pub fn resolve(&self, data_dir: &Path) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| data_dir.join("vendd.db"))
    }
}

// ─── Notification channels ───────────────────────────────────────────────────

/// Telegram channel settings (`[telegram]` in config.toml).
/// The channel is disabled unless both fields are set and non-empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: Option<String>,
    pub chat_id: Option<String>,
}

impl TelegramConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.token.as_deref(), self.chat_id.as_deref()) {
            (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
                Some((token, chat_id))
            }
            _ => None,
        }
    }
}

/// ntfy channel settings (`[ntfy]` in config.toml).
/// Disabled unless `url` is set and non-empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NtfyConfig {
    pub url: Option<String>,
}

impl NtfyConfig {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Log level filter string, e.g. "debug", "info,vendd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default) | "json".
    log_format: Option<String>,
    marketplace: Option<MarketplaceConfig>,
    database: Option<DatabaseConfig>,
    telegram: Option<TelegramConfig>,
    ntfy: Option<NtfyConfig>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── DaemonConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub data_dir: PathBuf,
    pub log: String,
    /// "pretty" (default) | "json".
    pub log_format: String,
    pub marketplace: MarketplaceConfig,
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub ntfy: NtfyConfig,
}

impl DaemonConfig {
    /// Build config from CLI args + optional TOML file + env vars.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(data_dir: Option<PathBuf>, log: Option<String>) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let toml = load_toml(&data_dir).unwrap_or_default();

        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("VENDD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let mut marketplace = toml.marketplace.unwrap_or_default();
        if let Ok(url) = std::env::var("VENDD_BASE_URL") {
            if !url.is_empty() {
                marketplace.base_url = url;
            }
        }

        let mut telegram = toml.telegram.unwrap_or_default();
        if let Ok(token) = std::env::var("VENDD_TELEGRAM_TOKEN") {
            if !token.is_empty() {
                telegram.token = Some(token);
            }
        }
        if let Ok(chat_id) = std::env::var("VENDD_TELEGRAM_CHAT_ID") {
            if !chat_id.is_empty() {
                telegram.chat_id = Some(chat_id);
            }
        }

        let database = toml.database.unwrap_or_default();

        let mut ntfy = toml.ntfy.unwrap_or_default();
        if let Ok(url) = std::env::var("VENDD_NTFY_URL") {
            if !url.is_empty() {
                ntfy.url = Some(url);
            }
        }

        Self {
            data_dir,
            log,
            log_format,
            marketplace,
            database,
            telegram,
            ntfy,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("vendd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("vendd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local").join("share").join("vendd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("vendd");
        }
    }
    PathBuf::from(".vendd")
}
