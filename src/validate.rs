//! Lenient validation and parsing of raw cart payloads.
//!
//! Cart items arrive from places the engine does not control — a local
//! slot that may hold a stale schema, a remote record written by another
//! client version. Malformed entries are filtered out with a warning,
//! never an error: a partially corrupt payload still yields a usable
//! cart.

use serde_json::Value;
use tracing::warn;

use crate::models::CartLineItem;

/// Decide whether a raw record resembles a well-formed cart line item.
///
/// Rejects non-objects, a missing or empty `productId`, a missing
/// `product` object, and a quantity that is not an integer >= 1.
/// `color` and `options` are optional. Never panics.
pub fn is_valid_cart_item(raw: &Value) -> bool {
    let Some(obj) = raw.as_object() else {
        return false;
    };

    match obj.get("productId").and_then(Value::as_str) {
        Some(id) if !id.trim().is_empty() => {}
        _ => return false,
    }

    if !obj.get("product").map(Value::is_object).unwrap_or(false) {
        return false;
    }

    match obj.get("quantity") {
        Some(q) => {
            if let Some(n) = q.as_u64() {
                n >= 1
            } else if let Some(f) = q.as_f64() {
                f >= 1.0 && f.fract() == 0.0
            } else {
                false
            }
        }
        None => false,
    }
}

/// Parse a JSON-encoded item array, dropping anything malformed.
///
/// Unparsable text or a non-array payload yields an empty list. Entries
/// failing [`is_valid_cart_item`] are skipped with a warning. The result
/// is validated but not deduplicated; callers run the deduplicator.
pub fn parse_cart_items(text: &str) -> Vec<CartLineItem> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(err) => {
            warn!(error = %err, "failed to parse cart payload");
            return Vec::new();
        }
    };

    let Some(entries) = value.as_array() else {
        warn!("cart payload is not an array");
        return Vec::new();
    };

    entries
        .iter()
        .filter(|entry| {
            let ok = is_valid_cart_item(entry);
            if !ok {
                warn!(entry = %entry, "dropping malformed cart item");
            }
            ok
        })
        .filter_map(|entry| match serde_json::from_value::<CartLineItem>(entry.clone()) {
            Ok(item) => Some(item),
            Err(err) => {
                warn!(error = %err, "dropping undecodable cart item");
                None
            }
        })
        .collect()
}
