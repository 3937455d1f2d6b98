//! Fulfillment pricing.
//!
//! Sale lines are not submitted at the storefront price: the POS price is
//! recomputed from the item's recorded cost, grossed up to the configured
//! margin. Items without usable cost data fall back to the price the
//! storefront charged, so a missing cost never aborts a sale.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::types::SaleLine;

/// Compute the unit price for one sale line.
///
/// With margin rate `m`, a cost `C` prices at `C / (1 - m)` rounded
/// half-away-from-zero to 2 decimal places. A missing, non-positive, or
/// unusable cost (including a margin rate outside `[0, 1)`) yields the
/// caller-supplied `fallback` unchanged.
#[must_use]
pub fn fulfillment_price(cost: Option<Decimal>, fallback: Decimal, margin_rate: Decimal) -> Decimal {
    let divisor = Decimal::ONE - margin_rate;
    match cost {
        Some(cost) if cost > Decimal::ZERO && divisor > Decimal::ZERO => (cost / divisor)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        _ => fallback,
    }
}

/// Totals for one sale submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaleTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Sum the lines and apply the flat tax rate.
///
/// `subtotal` is the exact sum of `unit_price * quantity`; `total` is the
/// taxed subtotal rounded half-away-from-zero to 2 decimal places; `tax` is
/// the difference, so the three always reconcile.
#[must_use]
pub fn sale_totals(lines: &[SaleLine], tax_rate: Decimal) -> SaleTotals {
    let subtotal: Decimal = lines
        .iter()
        .map(|line| line.unit_price * Decimal::from(line.quantity))
        .sum();
    let total = (subtotal * (Decimal::ONE + tax_rate))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    SaleTotals {
        subtotal,
        tax: total - subtotal,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(mantissa: i64, scale: u32) -> Decimal {
        Decimal::new(mantissa, scale)
    }

    const MARGIN: Decimal = Decimal::from_parts(20, 0, 0, false, 2); // 0.20
    const TAX: Decimal = Decimal::from_parts(7, 0, 0, false, 2); // 0.07

    fn line(unit_price: Decimal, quantity: u32) -> SaleLine {
        SaleLine {
            item_id: "55".to_string(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn cost_grosses_up_to_the_margin() {
        // 4.00 / 0.80 = 5.00
        assert_eq!(fulfillment_price(Some(dec(400, 2)), dec(1000, 2), MARGIN), dec(500, 2));
        // 1.00 / 0.80 = 1.25
        assert_eq!(fulfillment_price(Some(dec(100, 2)), dec(999, 2), MARGIN), dec(125, 2));
    }

    #[test]
    fn midpoints_round_away_from_zero() {
        // 0.02 / 0.80 = 0.025 -> 0.03
        assert_eq!(fulfillment_price(Some(dec(2, 2)), dec(100, 2), MARGIN), dec(3, 2));
    }

    #[test]
    fn unusable_cost_falls_back_to_caller_price() {
        let fallback = dec(1000, 2);
        assert_eq!(fulfillment_price(None, fallback, MARGIN), fallback);
        assert_eq!(fulfillment_price(Some(Decimal::ZERO), fallback, MARGIN), fallback);
        assert_eq!(fulfillment_price(Some(dec(-400, 2)), fallback, MARGIN), fallback);
    }

    #[test]
    fn degenerate_margin_falls_back() {
        let fallback = dec(1000, 2);
        assert_eq!(fulfillment_price(Some(dec(400, 2)), fallback, Decimal::ONE), fallback);
    }

    #[test]
    fn totals_apply_flat_tax() {
        // 2 x 5.00 = 10.00 subtotal, 10.70 total at 7%.
        let totals = sale_totals(&[line(dec(500, 2), 2)], TAX);
        assert_eq!(totals.subtotal, dec(1000, 2));
        assert_eq!(totals.total, dec(1070, 2));
        assert_eq!(totals.tax, dec(70, 2));
    }

    #[test]
    fn totals_sum_multiple_lines_before_taxing() {
        let totals = sale_totals(&[line(dec(500, 2), 2), line(dec(333, 2), 1)], TAX);
        // 10.00 + 3.33 = 13.33; * 1.07 = 14.2631 -> 14.26
        assert_eq!(totals.subtotal, dec(1333, 2));
        assert_eq!(totals.total, dec(1426, 2));
        assert_eq!(totals.tax, totals.total - totals.subtotal);
    }

    #[test]
    fn empty_sale_totals_to_zero() {
        let totals = sale_totals(&[], TAX);
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }
}
