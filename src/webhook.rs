//! Webhook event forwarder.
//!
//! Consumes [`CartEvent::Webhook`] events from a bus receiver and POSTs
//! them to the webhook server's emit endpoint, wrapped in the standard
//! envelope (`id`, `type`, `timestamp`, `source`, `data`, `metadata`).
//! Delivery is fire-and-forget: failures are logged and swallowed, and
//! cart state never depends on the outcome.

use anyhow::{bail, Result};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::WebhookConfig;
use crate::events::{CartEvent, WebhookEvent};

pub struct WebhookForwarder {
    client: reqwest::Client,
    emit_url: String,
}

impl WebhookForwarder {
    /// Build a forwarder, or `None` when no emit URL is configured.
    pub fn from_config(config: &WebhookConfig) -> Result<Option<Self>> {
        let Some(emit_url) = config.emit_url.clone() else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Some(Self { client, emit_url }))
    }

    /// Drain the receiver until the bus closes, forwarding webhook
    /// events and ignoring everything else. Typically spawned as a
    /// background task.
    pub async fn run(self, mut rx: UnboundedReceiver<CartEvent>) {
        while let Some(event) = rx.recv().await {
            if let CartEvent::Webhook(webhook) = event {
                if let Err(err) = self.emit(&webhook).await {
                    warn!(event_type = %webhook.event_type, error = %err, "webhook emit failed");
                }
            }
        }
    }

    /// POST one event to the emit endpoint.
    pub async fn emit(&self, event: &WebhookEvent) -> Result<()> {
        let envelope = json!({
            "id": Uuid::new_v4().to_string(),
            "type": event.event_type,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "source": "cart_context",
            "data": event.data,
            "metadata": event.metadata,
        });

        let response = self.client.post(&self.emit_url).json(&envelope).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "webhook emit failed (HTTP {}): {}",
                status,
                body.chars().take(500).collect::<String>()
            );
        }

        debug!(event_type = %event.event_type, "webhook event emitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_without_emit_url() {
        let config = WebhookConfig::default();
        assert!(WebhookForwarder::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn enabled_with_emit_url() {
        let config = WebhookConfig {
            emit_url: Some("http://localhost:3001/api/webhooks/emit".to_string()),
            ..Default::default()
        };
        assert!(WebhookForwarder::from_config(&config).unwrap().is_some());
    }
}
