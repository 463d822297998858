//! Subtotal, shipping, and total calculation.
//!
//! Pure and deterministic. Values are carried at full floating
//! precision; formatting to two decimals is the display layer's job, so
//! repeated recomputation stays stable.

use crate::config::ShippingConfig;
use crate::models::CartLineItem;

/// Derived money amounts for a cart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartTotals {
    pub subtotal: f64,
    pub shipping: f64,
    pub total: f64,
}

/// Compute subtotal, shipping, and total for a validated item list.
///
/// Shipping is zero when every item in a non-empty cart ships free;
/// otherwise zero at or above the free threshold, else the flat cost.
pub fn calculate_totals(items: &[CartLineItem], shipping: &ShippingConfig) -> CartTotals {
    let subtotal: f64 = items
        .iter()
        .map(|item| item.effective_unit_price() * f64::from(item.quantity))
        .sum();

    let all_free_shipping = !items.is_empty() && items.iter().all(|item| item.product.free_shipping);

    let shipping_cost = if all_free_shipping {
        0.0
    } else if subtotal >= shipping.free_threshold {
        0.0
    } else {
        shipping.flat_cost
    };

    CartTotals {
        subtotal,
        shipping: shipping_cost,
        total: subtotal + shipping_cost,
    }
}

/// Total units across all lines.
pub fn item_count(items: &[CartLineItem]) -> u32 {
    items.iter().map(|item| item.quantity).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductSnapshot;
    use std::collections::BTreeMap;

    fn item(price: f64, quantity: u32, free_shipping: bool, unit_price: Option<f64>) -> CartLineItem {
        CartLineItem {
            product_id: "p1".into(),
            product: ProductSnapshot {
                id: "p1".into(),
                name: "Tote".into(),
                price,
                images: vec![],
                free_shipping,
            },
            quantity,
            color: String::new(),
            options: BTreeMap::new(),
            unit_price,
        }
    }

    fn config() -> ShippingConfig {
        ShippingConfig {
            free_threshold: 100.0,
            flat_cost: 10.0,
        }
    }

    #[test]
    fn subtotal_sums_effective_prices() {
        let items = vec![item(20.0, 2, false, None), item(30.0, 1, false, Some(25.0))];
        let totals = calculate_totals(&items, &config());
        assert_eq!(totals.subtotal, 20.0 * 2.0 + 25.0);
    }

    #[test]
    fn below_threshold_pays_flat_cost() {
        let totals = calculate_totals(&[item(50.0, 1, false, None)], &config());
        assert_eq!(totals.shipping, 10.0);
        assert_eq!(totals.total, 60.0);
    }

    #[test]
    fn at_threshold_ships_free() {
        let totals = calculate_totals(&[item(100.0, 1, false, None)], &config());
        assert_eq!(totals.shipping, 0.0);
        assert_eq!(totals.total, 100.0);
    }

    #[test]
    fn above_threshold_ships_free() {
        let totals = calculate_totals(&[item(120.0, 1, false, None)], &config());
        assert_eq!(totals.shipping, 0.0);
        assert_eq!(totals.total, 120.0);
    }

    #[test]
    fn all_free_shipping_items_ship_free_below_threshold() {
        let items = vec![item(5.0, 1, true, None), item(10.0, 1, true, None)];
        let totals = calculate_totals(&items, &config());
        assert_eq!(totals.shipping, 0.0);
    }

    #[test]
    fn one_paid_shipping_item_breaks_the_exemption() {
        let items = vec![item(5.0, 1, true, None), item(10.0, 1, false, None)];
        let totals = calculate_totals(&items, &config());
        assert_eq!(totals.shipping, 10.0);
    }

    #[test]
    fn empty_cart_is_all_zero_except_shipping_policy() {
        // An empty cart is not "all free shipping"; the threshold rule
        // applies to a zero subtotal.
        let totals = calculate_totals(&[], &config());
        assert_eq!(totals.subtotal, 0.0);
        assert_eq!(totals.shipping, 10.0);
        assert_eq!(totals.total, 10.0);
    }

    #[test]
    fn item_count_sums_quantities() {
        let items = vec![item(1.0, 2, false, None), item(1.0, 3, false, None)];
        assert_eq!(item_count(&items), 5);
        assert_eq!(item_count(&[]), 0);
    }
}
