use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub shipping: ShippingConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Shipping policy knobs applied by the totals calculator.
#[derive(Debug, Deserialize, Clone)]
pub struct ShippingConfig {
    /// Orders at or above this subtotal ship free.
    #[serde(default = "default_free_threshold")]
    pub free_threshold: f64,
    /// Flat shipping cost below the threshold.
    #[serde(default = "default_flat_cost")]
    pub flat_cost: f64,
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            free_threshold: default_free_threshold(),
            flat_cost: default_flat_cost(),
        }
    }
}

fn default_free_threshold() -> f64 {
    100.0
}
fn default_flat_cost() -> f64 {
    10.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Path to the SQLite database holding the local cart slot.
    pub path: PathBuf,
    /// Key the cart is stored under. One slot per browsing session.
    #[serde(default = "default_slot_key")]
    pub slot_key: String,
}

fn default_slot_key() -> String {
    "konipai_cart".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    /// Base URL of the record store (e.g. `https://pb.example.com`).
    /// When unset the engine runs local-only.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_carts_collection")]
    pub carts_collection: String,
    #[serde(default = "default_users_collection")]
    pub users_collection: String,
    /// Optional auth token sent on every request.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            carts_collection: default_carts_collection(),
            users_collection: default_users_collection(),
            token: None,
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

fn default_carts_collection() -> String {
    "carts".to_string()
}
fn default_users_collection() -> String {
    "users".to_string()
}
fn default_remote_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Quiet window after the last mutation before a remote write fires.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Attempts per remote create/update call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First retry delay; doubles on each subsequent retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    1000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    /// Emit endpoint of the webhook server (e.g.
    /// `http://localhost:3001/api/webhooks/emit`). When unset the
    /// forwarder is disabled.
    #[serde(default)]
    pub emit_url: Option<String>,
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            emit_url: None,
            timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

fn default_webhook_timeout_secs() -> u64 {
    8
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate shipping
    if config.shipping.free_threshold < 0.0 {
        anyhow::bail!("shipping.free_threshold must be >= 0");
    }
    if config.shipping.flat_cost < 0.0 {
        anyhow::bail!("shipping.flat_cost must be >= 0");
    }

    // Validate storage
    if config.storage.slot_key.trim().is_empty() {
        anyhow::bail!("storage.slot_key must not be empty");
    }

    // Validate sync
    if config.sync.max_attempts < 1 {
        anyhow::bail!("sync.max_attempts must be >= 1");
    }

    if let Some(ref url) = config.remote.base_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("remote.base_url must be an http(s) URL, got '{}'", url);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cart.toml");
        std::fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let (_tmp, path) = write_config(
            r#"[storage]
path = "/tmp/cart.sqlite"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.shipping.free_threshold, 100.0);
        assert_eq!(config.shipping.flat_cost, 10.0);
        assert_eq!(config.storage.slot_key, "konipai_cart");
        assert_eq!(config.sync.debounce_ms, 1000);
        assert_eq!(config.sync.max_attempts, 3);
        assert_eq!(config.sync.initial_backoff_ms, 500);
        assert!(config.remote.base_url.is_none());
        assert_eq!(config.remote.carts_collection, "carts");
        assert_eq!(config.remote.users_collection, "users");
    }

    #[test]
    fn rejects_zero_attempts() {
        let (_tmp, path) = write_config(
            r#"[storage]
path = "/tmp/cart.sqlite"

[sync]
max_attempts = 0
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn rejects_negative_shipping_cost() {
        let (_tmp, path) = write_config(
            r#"[storage]
path = "/tmp/cart.sqlite"

[shipping]
flat_cost = -1.0
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn rejects_non_http_base_url() {
        let (_tmp, path) = write_config(
            r#"[storage]
path = "/tmp/cart.sqlite"

[remote]
base_url = "ftp://example.com"
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
