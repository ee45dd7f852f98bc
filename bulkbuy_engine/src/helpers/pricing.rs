//! Discount and VAT arithmetic for commitment totals.
//!
//! All amounts are minor units ([`Money`]). The discounted subtotal is computed on the
//! full line (unit price × quantity) before rounding, and VAT is charged on the
//! discounted subtotal, matching how the totals appear on the fulfilment order.

use bb_common::Money;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Per-unit price after discount.
    pub unit_price: Money,
    /// Discounted line subtotal, before VAT.
    pub subtotal: Money,
    pub vat: Money,
    /// Subtotal plus VAT; the amount placed on hold.
    pub total: Money,
}

/// Computes the discounted total for `quantity` units.
///
/// `discount_percent` and `vat_percent` are whole percentages. Rounding is half-up on
/// the minor unit, applied once per component.
pub fn discounted_total(list_unit_price: Money, quantity: i64, discount_percent: i64, vat_percent: i64) -> PriceBreakdown {
    let gross = list_unit_price * quantity;
    let subtotal = gross.percent(100 - discount_percent);
    let vat = subtotal.percent(vat_percent);
    let unit_price = list_unit_price.percent(100 - discount_percent);
    PriceBreakdown { unit_price, subtotal, vat, total: subtotal + vat }
}
