//! # Cart Sync
//!
//! A local-first shopping cart state synchronization engine.
//!
//! Cart Sync maintains a single, deduplicated cart across two storage
//! tiers — a durable local SQLite slot and a remote per-user record in a
//! PocketBase-style record store — under intermittent connectivity.
//! Mutations apply immediately and persist locally; remote writes are
//! debounced, retried with backoff, and never surface failures to the
//! caller. Side effects (analytics, webhooks, user notifications) are
//! published on an event bus and consumed by independent handlers.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Mutation   │──▶│ Synchronizer │──▶│ Local slot    │
//! │ API        │   │ (merge +     │   │ (SQLite)      │
//! └─────┬──────┘   │  debounce)   │   └───────────────┘
//!       │          └──────┬───────┘
//!       ▼                 ▼
//! ┌────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Event bus  │   │ Repository   │──▶│ Record store  │
//! │ (webhooks, │   │ (retry +     │   │ (PocketBase   │
//! │ analytics) │   │  backoff)    │   │  HTTP API)    │
//! └────────────┘   └──────────────┘   └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cart_sync::config::Config;
//! use cart_sync::engine::{AuthState, CartEngine};
//! use cart_sync::events::EventBus;
//! use cart_sync::models::ProductSnapshot;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = cart_sync::config::load_config("cart.toml".as_ref())?;
//! let (events, _rx) = EventBus::new();
//! let engine = CartEngine::open(&config, events).await?;
//!
//! engine.set_auth(AuthState::Guest).await;
//! let tote = ProductSnapshot {
//!     id: "p1".into(),
//!     name: "Canvas Tote".into(),
//!     price: 49.0,
//!     ..Default::default()
//! };
//! engine.add_item(tote, 2, "red", Default::default(), None).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Line items, product snapshots, remote projections |
//! | [`validate`] | Lenient cart item validation and parsing |
//! | [`dedup`] | Identity-tuple deduplication |
//! | [`totals`] | Subtotal, shipping, and total calculation |
//! | [`local_store`] | Durable local key-value slot (SQLite) |
//! | [`store`] | Record store abstraction + in-memory backend |
//! | [`pocketbase`] | PocketBase HTTP record store client |
//! | [`repository`] | Remote cart repository with retry/backoff |
//! | [`events`] | Fire-and-forget side-effect event bus |
//! | [`webhook`] | Webhook event forwarder |
//! | [`engine`] | Cart synchronizer and mutation API |

pub mod config;
pub mod dedup;
pub mod engine;
pub mod events;
pub mod local_store;
pub mod models;
pub mod pocketbase;
pub mod repository;
pub mod store;
pub mod totals;
pub mod validate;
pub mod webhook;
