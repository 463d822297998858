//! Fire-and-forget side-effect events.
//!
//! The mutation API publishes everything that is not cart state — the
//! analytics add/remove events, webhook emissions, user notifications,
//! and the cart-open affordance — onto an unbounded channel. Consumers
//! (a UI layer, the [`webhook`](crate::webhook) forwarder, a test
//! harness) drain the receiver independently; publishing never blocks
//! and never fails, and a dropped receiver is fine.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// One commerce item as reported to the analytics sink.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsItem {
    pub item_id: String,
    pub item_name: String,
    pub price: f64,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_variant: Option<String>,
}

/// Outbound webhook event, pre-envelope.
///
/// `data` carries the affected item/cart payload; `metadata` names the
/// source (`cart_context`) and the acting user when known.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
    pub metadata: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// User-visible toast message.
#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

/// Everything the cart engine emits besides state changes.
#[derive(Debug, Clone)]
pub enum CartEvent {
    /// Commerce analytics event (`add_to_cart`, `remove_from_cart`).
    Analytics {
        name: String,
        items: Vec<AnalyticsItem>,
    },
    /// Webhook emission (`cart.item_added` and friends).
    Webhook(WebhookEvent),
    /// Toast for the user.
    Notification(Notification),
    /// Ask the UI to open the cart drawer.
    CartOpened,
}

/// Publishing half of the side-effect channel.
#[derive(Clone)]
pub struct EventBus {
    tx: UnboundedSender<CartEvent>,
}

impl EventBus {
    /// Create a bus and the receiver that drains it.
    pub fn new() -> (Self, UnboundedReceiver<CartEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publish an event. A closed channel (no consumer) is not an
    /// error; side effects must never affect cart state.
    pub fn publish(&self, event: CartEvent) {
        let _ = self.tx.send(event);
    }

    pub fn notify_success(&self, title: impl Into<String>, message: impl Into<String>) {
        self.publish(CartEvent::Notification(Notification {
            level: NotificationLevel::Success,
            title: title.into(),
            message: message.into(),
        }));
    }

    pub fn notify_error(&self, title: impl Into<String>, message: impl Into<String>) {
        self.publish(CartEvent::Notification(Notification {
            level: NotificationLevel::Error,
            title: title.into(),
            message: message.into(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_in_order() {
        let (bus, mut rx) = EventBus::new();
        bus.publish(CartEvent::CartOpened);
        bus.notify_success("Added to Cart", "Tote x1 added to your cart.");

        assert!(matches!(rx.recv().await, Some(CartEvent::CartOpened)));
        match rx.recv().await {
            Some(CartEvent::Notification(n)) => {
                assert_eq!(n.level, NotificationLevel::Success);
                assert_eq!(n.title, "Added to Cart");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn publish_without_consumer_is_a_no_op() {
        let (bus, rx) = EventBus::new();
        drop(rx);
        bus.publish(CartEvent::CartOpened);
    }
}
