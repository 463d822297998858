//! Durable local persistence for the cart.
//!
//! The cart is stored as a single JSON text value in a SQLite key-value
//! slot, one row per key. Writes never block a mutation: failures are
//! logged and swallowed. Reads are defensive: a corrupt slot is cleared
//! and treated as an empty cart, and every loaded item passes through
//! the validator and deduplicator so a partially corrupt payload still
//! yields a consistent cart.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::warn;

use crate::config::StorageConfig;
use crate::dedup::deduplicate_cart_items;
use crate::models::CartLineItem;
use crate::validate::parse_cart_items;

pub struct LocalCartStore {
    pool: SqlitePool,
    key: String,
}

impl LocalCartStore {
    /// Open (and create if missing) the backing database and slot table.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cart_slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            key: config.slot_key.clone(),
        })
    }

    /// Persist the item array under the fixed slot key.
    ///
    /// Serialization or write failures are logged and swallowed so a
    /// storage hiccup never blocks a cart mutation.
    pub async fn save(&self, items: &[CartLineItem]) {
        let payload = match serde_json::to_string(items) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "failed to serialize cart for local save");
                return;
            }
        };

        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO cart_slots (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.key)
        .bind(&payload)
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            warn!(error = %err, "failed to save cart to local slot");
        }
    }

    /// Load the cart from the slot.
    ///
    /// A missing slot is an empty cart. Unparsable text clears the
    /// corrupt slot and yields an empty cart. The returned list is
    /// validated and deduplicated. Only database-level failures
    /// propagate; the engine treats those as a last-resort empty cart.
    pub async fn load(&self) -> Result<Vec<CartLineItem>> {
        let stored: Option<String> = sqlx::query_scalar("SELECT value FROM cart_slots WHERE key = ?")
            .bind(&self.key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(text) = stored else {
            return Ok(Vec::new());
        };

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        if serde_json::from_str::<serde_json::Value>(&text).is_err() {
            warn!("local cart slot is corrupt, clearing it");
            self.clear().await;
            return Ok(Vec::new());
        }

        Ok(deduplicate_cart_items(parse_cart_items(&text)))
    }

    /// Remove the slot. Failures are logged and swallowed.
    pub async fn clear(&self) {
        let result = sqlx::query("DELETE FROM cart_slots WHERE key = ?")
            .bind(&self.key)
            .execute(&self.pool)
            .await;

        if let Err(err) = result {
            warn!(error = %err, "failed to clear local cart slot");
        }
    }

    /// Raw slot contents, for diagnostics and tests.
    pub async fn raw(&self) -> Result<Option<String>> {
        let stored = sqlx::query_scalar("SELECT value FROM cart_slots WHERE key = ?")
            .bind(&self.key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(stored)
    }

    /// Overwrite the slot with arbitrary text, bypassing serialization.
    /// Exists so tests can plant corrupt payloads.
    pub async fn write_raw(&self, text: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO cart_slots (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.key)
        .bind(text)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
