//! Remote cart repository.
//!
//! Owns the create-vs-update branching and the retry policy for the
//! per-user remote cart record. Remote sync is best-effort: nothing in
//! here surfaces an error to the mutation path — every failure mode
//! terminates in a logged warning.
//!
//! # Retry Strategy
//!
//! - Stale-user guard (user record missing) → abort silently, no retry.
//! - Create/update failure → retry with exponential backoff, delays
//!   starting at the configured initial backoff and doubling
//!   (500ms, 1000ms, ... by default).
//! - Retries exhausted → log and swallow; the next mutation re-triggers
//!   sync from current state.

use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{RemoteConfig, SyncConfig};
use crate::models::{encode_remote_items, CartLineItem, RemoteCartRecord};
use crate::store::RecordStore;

/// Attempt count and backoff schedule for remote writes.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before the given attempt (1-based). The first attempt has
    /// no delay; each retry doubles the previous delay.
    fn backoff_before(&self, attempt: u32) -> Option<Duration> {
        if attempt <= 1 {
            return None;
        }
        Some(self.initial_backoff * 2u32.saturating_pow(attempt - 2))
    }
}

#[derive(Clone)]
pub struct RemoteCartRepository {
    store: Arc<dyn RecordStore>,
    carts_collection: String,
    users_collection: String,
    retry: RetryPolicy,
}

impl RemoteCartRepository {
    pub fn new(store: Arc<dyn RecordStore>, remote: &RemoteConfig, sync: &SyncConfig) -> Self {
        Self {
            store,
            carts_collection: remote.carts_collection.clone(),
            users_collection: remote.users_collection.clone(),
            retry: RetryPolicy {
                max_attempts: sync.max_attempts.max(1),
                initial_backoff: Duration::from_millis(sync.initial_backoff_ms),
            },
        }
    }

    fn user_filter(user_id: &str) -> String {
        format!("user=\"{}\"", user_id)
    }

    /// Fetch the cart record for a user. Absence is `Ok(None)`; only
    /// transport-level failures propagate (the synchronizer treats
    /// those as "no remote cart" too).
    pub async fn fetch_for_user(&self, user_id: &str) -> Result<Option<RemoteCartRecord>> {
        let found = self
            .store
            .get_first_list_item(&self.carts_collection, &Self::user_filter(user_id))
            .await?;

        let Some(value) = found else {
            return Ok(None);
        };

        match serde_json::from_value::<RemoteCartRecord>(value) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                warn!(error = %err, "remote cart record has an unexpected shape");
                Ok(None)
            }
        }
    }

    /// Write the cart for a user, creating the record on first sync.
    ///
    /// Best-effort: aborts silently when the user record is gone (stale
    /// session), retries transient create/update failures with backoff,
    /// and swallows exhaustion. Never returns an error.
    pub async fn upsert_for_user(&self, user_id: &str, items: &[CartLineItem]) {
        if user_id.trim().is_empty() {
            warn!("cart sync skipped: empty user id");
            return;
        }

        // Guard against a stale/expired session writing under a deleted
        // identity. No retry on this path.
        match self.store.get_one(&self.users_collection, user_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(user_id, "user record missing, cart sync skipped");
                return;
            }
            Err(err) => {
                warn!(user_id, error = %err, "user verification failed, cart sync skipped");
                return;
            }
        }

        // A lookup failure counts as "no cart yet" and falls through to
        // create, matching the store client's not-found contract.
        let existing_id: Option<String> = match self
            .store
            .get_first_list_item(&self.carts_collection, &Self::user_filter(user_id))
            .await
        {
            Ok(found) => found.and_then(|record| {
                record
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            }),
            Err(err) => {
                warn!(user_id, error = %err, "existing cart lookup failed, attempting create");
                None
            }
        };

        let payload = json!({
            "user": user_id,
            "items": encode_remote_items(items),
        });

        for attempt in 1..=self.retry.max_attempts {
            if let Some(delay) = self.retry.backoff_before(attempt) {
                tokio::time::sleep(delay).await;
            }

            let result = match &existing_id {
                Some(id) => self.store.update(&self.carts_collection, id, &payload).await,
                None => self.store.create(&self.carts_collection, &payload).await,
            };

            match result {
                Ok(_) => {
                    debug!(
                        user_id,
                        items = items.len(),
                        created = existing_id.is_none(),
                        "remote cart synced"
                    );
                    return;
                }
                Err(err) => {
                    warn!(
                        user_id,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %err,
                        "remote cart write failed"
                    );
                }
            }
        }

        warn!(
            user_id,
            attempts = self.retry.max_attempts,
            "remote cart sync abandoned after exhausting retries"
        );
    }
}
