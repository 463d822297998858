//! Cart synchronizer and mutation API.
//!
//! [`CartEngine`] owns the in-memory cart for one browsing session and
//! keeps it consistent across the local slot and the remote record.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──set_auth(known)──▶ Loading ──merge──▶ Ready
//! ```
//!
//! While the authenticated identity is unknown the engine does nothing.
//! Once it is known, the merge protocol runs: load local, fetch remote
//! (signed-in only), and let the remote cart win if it is non-empty —
//! whole-cart granularity, no per-item conflict resolution. The merge
//! re-runs only when the identity changes (login/logout). Failures
//! never leave `Ready` once reached: the cart stays usable on
//! best-effort degraded data.
//!
//! # Continuous sync
//!
//! Every mutation re-validates, deduplicates, saves locally, and — when
//! signed in — schedules a debounced remote write. The debounce timer
//! resets on each mutation so a burst of rapid changes collapses into
//! one write; [`shutdown`](CartEngine::shutdown) cancels any pending
//! write, which is safe because the local slot already holds the latest
//! state.

use anyhow::Result;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::{Config, ShippingConfig};
use crate::dedup::deduplicate_cart_items;
use crate::events::{AnalyticsItem, CartEvent, EventBus, WebhookEvent};
use crate::local_store::LocalCartStore;
use crate::models::{CartLineItem, ProductSnapshot};
use crate::pocketbase::PocketBaseStore;
use crate::repository::RemoteCartRepository;
use crate::store::RecordStore;
use crate::totals::{calculate_totals, item_count, CartTotals};
use crate::validate::parse_cart_items;

/// What the authentication provider currently knows about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Auth status is still being determined; all sync is suspended.
    Unknown,
    /// Browsing without an account; local-only persistence.
    Guest,
    /// Authenticated as the given user id; remote sync enabled.
    SignedIn(String),
}

/// Cart lifecycle phase. There is no error phase: failures degrade to
/// best-effort data rather than making the cart unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Uninitialized,
    Loading,
    Ready,
}

/// Point-in-time view of the cart for rendering.
#[derive(Debug, Clone)]
pub struct CartSnapshot {
    pub items: Vec<CartLineItem>,
    pub totals: CartTotals,
    pub item_count: u32,
    pub phase: SyncPhase,
}

struct EngineState {
    items: Vec<CartLineItem>,
    phase: SyncPhase,
    auth: AuthState,
    pending_sync: Option<JoinHandle<()>>,
}

pub struct CartEngine {
    local: LocalCartStore,
    repository: Option<RemoteCartRepository>,
    events: EventBus,
    shipping: ShippingConfig,
    debounce: Duration,
    state: Mutex<EngineState>,
}

impl CartEngine {
    /// Open an engine from configuration, building the PocketBase
    /// store when a remote base URL is configured.
    pub async fn open(config: &Config, events: EventBus) -> Result<Self> {
        let store: Option<Arc<dyn RecordStore>> = match &config.remote.base_url {
            Some(_) => Some(Arc::new(PocketBaseStore::new(&config.remote)?)),
            None => None,
        };
        Self::with_store(config, store, events).await
    }

    /// Open an engine over an explicit record store (or none for a
    /// local-only cart).
    pub async fn with_store(
        config: &Config,
        store: Option<Arc<dyn RecordStore>>,
        events: EventBus,
    ) -> Result<Self> {
        let local = LocalCartStore::open(&config.storage).await?;
        let repository =
            store.map(|store| RemoteCartRepository::new(store, &config.remote, &config.sync));

        Ok(Self {
            local,
            repository,
            events,
            shipping: config.shipping.clone(),
            debounce: Duration::from_millis(config.sync.debounce_ms),
            state: Mutex::new(EngineState {
                items: Vec::new(),
                phase: SyncPhase::Uninitialized,
                auth: AuthState::Unknown,
                pending_sync: None,
            }),
        })
    }

    // ============ Synchronizer ============

    /// Report the current authentication state.
    ///
    /// The merge protocol runs when the identity becomes known or
    /// changes (login/logout) and only then. `Unknown` suspends the
    /// engine. Merges are serialized: a second call waits for the
    /// previous merge to finish.
    pub async fn set_auth(&self, auth: AuthState) {
        let mut state = self.state.lock().await;

        if state.auth == auth && state.phase == SyncPhase::Ready {
            return;
        }
        state.auth = auth;

        if state.auth == AuthState::Unknown {
            state.phase = SyncPhase::Uninitialized;
            return;
        }

        state.phase = SyncPhase::Loading;

        let local_items = match self.local.load().await {
            Ok(items) => items,
            Err(err) => {
                warn!(error = %err, "local cart load failed, starting empty");
                self.events.notify_error(
                    "Error",
                    "Failed to load your cart. Please try refreshing the page.",
                );
                Vec::new()
            }
        };

        // Remote wins if non-empty: a cart built on another device is
        // more authoritative than whatever this session had locally.
        let mut resolved = local_items;
        if let (AuthState::SignedIn(user_id), Some(repo)) = (&state.auth, &self.repository) {
            match repo.fetch_for_user(user_id).await {
                Ok(Some(record)) => {
                    let remote_items = deduplicate_cart_items(parse_cart_items(&record.items));
                    if !remote_items.is_empty() {
                        self.local.save(&remote_items).await;
                        resolved = remote_items;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "remote cart fetch failed, using local cart");
                }
            }
        }

        state.items = resolved;
        state.phase = SyncPhase::Ready;
    }

    /// Cancel any pending debounced remote write. Call on session
    /// teardown; the local slot already holds the latest state, so the
    /// next load re-attempts remote sync.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let Some(handle) = state.pending_sync.take() {
            handle.abort();
        }
    }

    /// Dedup, save locally, and schedule the debounced remote write.
    /// Runs under the state lock, so local writes land in mutation
    /// order.
    async fn persist_and_schedule(&self, state: &mut EngineState) {
        let items = deduplicate_cart_items(std::mem::take(&mut state.items));
        self.local.save(&items).await;
        state.items = items;

        if let (AuthState::SignedIn(user_id), Some(repo)) = (&state.auth, &self.repository) {
            if let Some(handle) = state.pending_sync.take() {
                handle.abort();
            }

            let repo = repo.clone();
            let user_id = user_id.clone();
            let items = state.items.clone();
            let debounce = self.debounce;
            state.pending_sync = Some(tokio::spawn(async move {
                tokio::time::sleep(debounce).await;
                repo.upsert_for_user(&user_id, &items).await;
            }));
        }
    }

    fn webhook_metadata(&self, state: &EngineState) -> serde_json::Value {
        let user_id = match &state.auth {
            AuthState::SignedIn(id) => json!(id),
            _ => serde_json::Value::Null,
        };
        json!({
            "source": "cart_context",
            "user_id": user_id,
        })
    }

    // ============ Mutation API ============

    /// Add a product to the cart, merging into an existing line when
    /// the identity tuple (product, color, options, effective price)
    /// already exists.
    ///
    /// Invalid input (empty product id, zero quantity) emits an error
    /// notification and changes nothing.
    pub async fn add_item(
        &self,
        product: ProductSnapshot,
        quantity: u32,
        color: &str,
        options: BTreeMap<String, String>,
        unit_price: Option<f64>,
    ) {
        if product.id.trim().is_empty() {
            self.events
                .notify_error("Error", "Could not add product to cart. Invalid product.");
            return;
        }
        if quantity < 1 {
            self.events
                .notify_error("Error", "Please select a valid quantity.");
            return;
        }

        let candidate = CartLineItem {
            product_id: product.id.clone(),
            product,
            quantity,
            color: color.to_string(),
            options,
            unit_price,
        };
        let identity = candidate.identity();

        let mut state = self.state.lock().await;

        let existing = state
            .items
            .iter()
            .position(|item| item.identity() == identity);

        let (updated, affected) = match existing {
            Some(index) => {
                state.items[index].quantity += quantity;
                (true, state.items[index].clone())
            }
            None => {
                state.items.push(candidate.clone());
                (false, candidate)
            }
        };

        self.events.publish(CartEvent::Analytics {
            name: "add_to_cart".to_string(),
            items: vec![AnalyticsItem {
                item_id: affected.product_id.clone(),
                item_name: affected.product.name.clone(),
                price: affected.effective_unit_price(),
                quantity,
                item_variant: affected.variant_string(),
            }],
        });

        self.events.publish(CartEvent::CartOpened);

        self.events.notify_success(
            "Added to Cart",
            format!("{} x{} added to your cart.", affected.product.name, quantity),
        );

        let event_type = if updated { "cart.item_updated" } else { "cart.item_added" };
        self.events.publish(CartEvent::Webhook(WebhookEvent {
            event_type: event_type.to_string(),
            data: json!({
                "item": {
                    "product_id": affected.product_id,
                    "name": affected.product.name,
                    "quantity": affected.quantity,
                    "color": affected.color,
                    "options": affected.options,
                    "unit_price": affected.effective_unit_price(),
                },
                "cart": {
                    "item_count": item_count(&state.items),
                },
            }),
            metadata: self.webhook_metadata(&state),
        }));

        self.persist_and_schedule(&mut state).await;
    }

    /// Remove every line matching the product id — all color/option
    /// variants at once. No-op when nothing matches.
    pub async fn remove_item(&self, product_id: &str) {
        let mut state = self.state.lock().await;

        let removed: Vec<CartLineItem> = state
            .items
            .iter()
            .filter(|item| item.product_id == product_id)
            .cloned()
            .collect();
        if removed.is_empty() {
            return;
        }

        state.items.retain(|item| item.product_id != product_id);

        for item in &removed {
            self.events.publish(CartEvent::Analytics {
                name: "remove_from_cart".to_string(),
                items: vec![AnalyticsItem {
                    item_id: item.product_id.clone(),
                    item_name: item.product.name.clone(),
                    price: item.product.price,
                    quantity: item.quantity,
                    item_variant: if item.color.is_empty() {
                        None
                    } else {
                        Some(item.color.clone())
                    },
                }],
            });
        }

        let first = &removed[0];
        self.events.publish(CartEvent::Webhook(WebhookEvent {
            event_type: "cart.item_removed".to_string(),
            data: json!({
                "item": {
                    "product_id": first.product_id,
                    "name": first.product.name,
                    "quantity": first.quantity,
                    "color": first.color,
                    "options": first.options,
                },
            }),
            metadata: self.webhook_metadata(&state),
        }));

        self.persist_and_schedule(&mut state).await;
    }

    /// Set the quantity on every line matching the product id. A
    /// quantity below one delegates to [`remove_item`](Self::remove_item).
    /// Analytics report the delta (more units added or removed), not
    /// the absolute quantity.
    pub async fn set_quantity(&self, product_id: &str, quantity: u32) {
        if quantity < 1 {
            self.remove_item(product_id).await;
            return;
        }

        let mut state = self.state.lock().await;

        let Some(existing) = state
            .items
            .iter()
            .find(|item| item.product_id == product_id)
            .cloned()
        else {
            return;
        };
        let old_quantity = existing.quantity;

        for item in &mut state.items {
            if item.product_id == product_id {
                item.quantity = quantity;
            }
        }

        if quantity != old_quantity {
            let (name, delta) = if quantity > old_quantity {
                ("add_to_cart", quantity - old_quantity)
            } else {
                ("remove_from_cart", old_quantity - quantity)
            };
            self.events.publish(CartEvent::Analytics {
                name: name.to_string(),
                items: vec![AnalyticsItem {
                    item_id: existing.product_id.clone(),
                    item_name: existing.product.name.clone(),
                    price: existing.product.price,
                    quantity: delta,
                    item_variant: if existing.color.is_empty() {
                        None
                    } else {
                        Some(existing.color.clone())
                    },
                }],
            });

            self.events.publish(CartEvent::Webhook(WebhookEvent {
                event_type: "cart.item_updated".to_string(),
                data: json!({
                    "item": {
                        "product_id": existing.product_id,
                        "name": existing.product.name,
                        "old_quantity": old_quantity,
                        "new_quantity": quantity,
                        "color": existing.color,
                        "options": existing.options,
                    },
                }),
                metadata: self.webhook_metadata(&state),
            }));
        }

        self.persist_and_schedule(&mut state).await;
    }

    /// Empty the cart. Emits `cart.cleared` (with the cleared product
    /// ids and quantities) only when the cart was non-empty; no
    /// analytics event — checkout flows track completion separately.
    pub async fn clear_cart(&self) {
        let mut state = self.state.lock().await;

        if !state.items.is_empty() {
            let cleared: Vec<serde_json::Value> = state
                .items
                .iter()
                .map(|item| {
                    json!({
                        "product_id": item.product_id,
                        "quantity": item.quantity,
                    })
                })
                .collect();

            self.events.publish(CartEvent::Webhook(WebhookEvent {
                event_type: "cart.cleared".to_string(),
                data: json!({ "items_cleared": cleared }),
                metadata: self.webhook_metadata(&state),
            }));
        }

        state.items.clear();
        self.persist_and_schedule(&mut state).await;
    }

    // ============ Accessors ============

    pub async fn items(&self) -> Vec<CartLineItem> {
        self.state.lock().await.items.clone()
    }

    /// Find a line by product id, optionally narrowed by color.
    pub async fn get_item(&self, product_id: &str, color: Option<&str>) -> Option<CartLineItem> {
        self.state
            .lock()
            .await
            .items
            .iter()
            .find(|item| {
                item.product_id == product_id && color.map_or(true, |c| item.color == c)
            })
            .cloned()
    }

    pub async fn totals(&self) -> CartTotals {
        calculate_totals(&self.state.lock().await.items, &self.shipping)
    }

    pub async fn item_count(&self) -> u32 {
        item_count(&self.state.lock().await.items)
    }

    pub async fn phase(&self) -> SyncPhase {
        self.state.lock().await.phase
    }

    pub async fn snapshot(&self) -> CartSnapshot {
        let state = self.state.lock().await;
        CartSnapshot {
            totals: calculate_totals(&state.items, &self.shipping),
            item_count: item_count(&state.items),
            items: state.items.clone(),
            phase: state.phase,
        }
    }
}
