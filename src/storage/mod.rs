//! SQLite-backed storage for the code inventory and provider sessions.
//!
//! WAL mode, embedded migrations. The allocator runs its own transactions
//! against the shared pool; this module owns the schema, the row types and
//! the non-transactional queries (session load, inventory seeding).

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// A sellable item/title mapped to a pool of interchangeable codes.
///
/// Immutable except `active` — deactivated offers are skipped by title
/// matching but keep their code history.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Offer {
    pub id: i64,
    pub title: String,
    /// Appended to the reply when a code was successfully allocated.
    pub message_correct: String,
    /// Composed into the apology reply when inventory is exhausted.
    pub message_failed: String,
    pub active: bool,
}

/// A single-use credential string, allocated at most once.
///
/// `used = false` implies `conversation_id IS NULL`; once reserved, the
/// conversation id is set in the same transaction and never reassigned.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Code {
    pub id: i64,
    pub value: String,
    pub offer_id: i64,
    pub used: bool,
    pub conversation_id: Option<String>,
    /// Full reply message composed at allocation time.
    pub message: Option<String>,
    pub created_at: chrono::NaiveDateTime,
}

/// Persisted per-provider session, stored as a JSON `config` column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSession {
    #[serde(default)]
    pub cookies: HashMap<String, String>,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Open (or create) the default `vendd.db` under `data_dir`.
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::open(&data_dir.join("vendd.db")).await
    }

    /// Open (or create) the database at `db_path` and run migrations.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        // Single connection: SQLite allows one writer at a time anyway, so
        // the pool queue is the serialization point and transactions never
        // see SQLITE_BUSY from each other.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        sqlx::migrate!("src/storage/migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        info!(path = %db_path.display(), "storage ready");
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    /// The allocator opens its transactions on this shared pool.
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    // ── Provider sessions ────────────────────────────────────────────────────

    /// Load the persisted session for `provider`, if one exists.
    pub async fn provider_session(&self, provider: &str) -> Result<Option<ProviderSession>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT config FROM provider_sessions WHERE provider = ?1")
                .bind(provider)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some((config,)) => {
                let session: ProviderSession = serde_json::from_str(&config)
                    .with_context(|| format!("invalid session config for provider {provider}"))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Insert or replace the persisted session for `provider`.
    pub async fn upsert_provider_session(
        &self,
        provider: &str,
        session: &ProviderSession,
    ) -> Result<()> {
        let config = serde_json::to_string(session)?;
        sqlx::query(
            "INSERT INTO provider_sessions (provider, config) VALUES (?1, ?2)
             ON CONFLICT(provider) DO UPDATE SET config = excluded.config",
        )
        .bind(provider)
        .bind(config)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ── Inventory seeding ────────────────────────────────────────────────────
    // Offer/code rows are normally provisioned out-of-band; these helpers
    // exist for ops seeding and tests.

    /// Insert an offer and return its id.
    pub async fn insert_offer(
        &self,
        title: &str,
        message_correct: &str,
        message_failed: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO offers (title, message_correct, message_failed, active)
             VALUES (?1, ?2, ?3, 1)",
        )
        .bind(title)
        .bind(message_correct)
        .bind(message_failed)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Insert an unused code for `offer_id` and return its id.
    pub async fn insert_code(&self, offer_id: i64, value: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO codes (value, offer_id, used) VALUES (?1, ?2, 0)")
            .bind(value)
            .bind(offer_id)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Flip an offer's `active` flag.
    pub async fn set_offer_active(&self, offer_id: i64, active: bool) -> Result<()> {
        sqlx::query("UPDATE offers SET active = ?1 WHERE id = ?2")
            .bind(active)
            .bind(offer_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
