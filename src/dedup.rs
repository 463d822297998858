//! Identity-tuple deduplication.
//!
//! A persisted cart must never hold two items with the same identity
//! tuple (product, color, options, effective price). Colliding items
//! are collapsed into one by summing quantities.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::models::{CartLineItem, ItemIdentity};

/// Collapse items that refer to the same logical purchase.
///
/// Within a group the first-seen item keeps its metadata (snapshot,
/// options, unit price); later duplicates contribute only quantity.
/// Output order is first-occurrence order. Idempotent.
pub fn deduplicate_cart_items(items: Vec<CartLineItem>) -> Vec<CartLineItem> {
    let mut out: Vec<CartLineItem> = Vec::with_capacity(items.len());
    let mut seen: HashMap<ItemIdentity, usize> = HashMap::with_capacity(items.len());

    for item in items {
        match seen.entry(item.identity()) {
            Entry::Occupied(slot) => {
                out[*slot.get()].quantity += item.quantity;
            }
            Entry::Vacant(slot) => {
                slot.insert(out.len());
                out.push(item);
            }
        }
    }

    out
}
