//! Core data models for the cart engine.
//!
//! A [`CartLineItem`] is one purchasable line in the cart. Two line items
//! are the *same logical item* — and get merged by the deduplicator —
//! when their identity tuple matches: product id, color, canonicalized
//! options, and effective unit price. [`RemoteLineItem`] is the reduced
//! projection actually persisted to the remote record store.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Denormalized copy of the product fields needed for display and
/// pricing fallback. Owned by the line item; refreshed only by
/// re-adding the product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductSnapshot {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Unit price. Upstream records sometimes carry this as a numeric
    /// string; anything non-numeric coerces to 0 rather than failing.
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: f64,
    #[serde(default, deserialize_with = "lenient_images")]
    pub images: Vec<String>,
    #[serde(default)]
    pub free_shipping: bool,
}

/// One purchasable line in the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineItem {
    #[serde(rename = "productId")]
    pub product_id: String,
    pub product: ProductSnapshot,
    pub quantity: u32,
    /// May be empty; part of the identity tuple.
    #[serde(default)]
    pub color: String,
    /// Variant/selection metadata (size, combo type, discount fields).
    /// Ordered map so canonicalization never depends on insertion order.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// Overrides `product.price` when present (variant-specific pricing).
    #[serde(rename = "unitPrice", default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
}

/// Hashable identity tuple used for merge/dedup decisions.
///
/// Price enters as raw bits so equality matches the exact comparison
/// the mutation API performs, without an `Eq`-on-float escape hatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemIdentity {
    pub product_id: String,
    pub color: String,
    pub options_key: String,
    price_bits: u64,
}

impl CartLineItem {
    /// The price actually charged per unit: the explicit override when
    /// present, otherwise the product snapshot price.
    pub fn effective_unit_price(&self) -> f64 {
        self.unit_price.unwrap_or(self.product.price)
    }

    /// Canonical `key:value` join of the options map, `|`-separated.
    /// The map is ordered, so equal option sets always canonicalize
    /// identically.
    pub fn options_key(&self) -> String {
        options_key(&self.options)
    }

    /// The `(product, color, options, effective price)` identity tuple.
    pub fn identity(&self) -> ItemIdentity {
        ItemIdentity {
            product_id: self.product_id.clone(),
            color: self.color.clone(),
            options_key: self.options_key(),
            price_bits: self.effective_unit_price().to_bits(),
        }
    }

    /// Human-readable variant string for analytics payloads:
    /// color plus canonicalized options, empty parts dropped.
    pub fn variant_string(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        if !self.color.is_empty() {
            parts.push(self.color.clone());
        }
        for (k, v) in &self.options {
            parts.push(format!("{}:{}", k, v));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("|"))
        }
    }
}

/// Canonicalize an options map: sorted `key:value` pairs joined by `|`.
pub fn options_key(options: &BTreeMap<String, String>) -> String {
    options
        .iter()
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect::<Vec<_>>()
        .join("|")
}

// ============ Remote projection ============

/// Product fields kept in the remote payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteProductRef {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub images: Vec<String>,
}

/// Reduced projection of a line item sent to the remote store.
///
/// Drops UI-only fields (`free_shipping`, `unit_price`); `color`
/// defaults to the empty string and `options` to an empty map so the
/// wrapped store's schema validation never sees a malformed shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLineItem {
    #[serde(rename = "productId")]
    pub product_id: String,
    pub product: RemoteProductRef,
    pub quantity: u32,
    pub color: String,
    pub options: BTreeMap<String, String>,
}

impl From<&CartLineItem> for RemoteLineItem {
    fn from(item: &CartLineItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            product: RemoteProductRef {
                id: item.product.id.clone(),
                name: item.product.name.clone(),
                price: item.product.price,
                images: item.product.images.clone(),
            },
            quantity: item.quantity,
            color: item.color.clone(),
            options: item.options.clone(),
        }
    }
}

/// Serialize the reduced projection of a cart as the JSON text stored
/// in the remote record's `items` field.
pub fn encode_remote_items(items: &[CartLineItem]) -> String {
    let reduced: Vec<RemoteLineItem> = items.iter().map(RemoteLineItem::from).collect();
    serde_json::to_string(&reduced).unwrap_or_else(|_| "[]".to_string())
}

/// Server-side cart representation: one record per authenticated user,
/// with the item array JSON-encoded into a single text field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCartRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub items: String,
}

// ============ Lenient deserializers ============

fn lenient_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_price(&value))
}

/// Coerce a JSON value to a price: numbers pass through, numeric
/// strings parse, everything else is 0.
pub fn coerce_price(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn lenient_images<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Array(entries) => Ok(entries
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect()),
        _ => Ok(Vec::new()),
    }
}
