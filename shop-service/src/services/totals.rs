//! Invoice total computation.
//!
//! Tax and discount are percentages of the subtotal. The grand total is
//! rounded to a whole amount and then snapped to a multiple of ten by its
//! last digit: 0–4 round down, 5 stays, 6–9 round up.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::error::{ShopError, ShopResult};
use crate::models::LineItem;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Reject percentages outside `[0, 100]`.
pub fn validate_rate(name: &'static str, value: Decimal) -> ShopResult<Decimal> {
    if value < Decimal::ZERO || value > HUNDRED {
        return Err(ShopError::InvalidRate { name, value });
    }
    Ok(value)
}

/// Pure totals calculation. Rates must already be validated.
///
/// Every step is checked; amounts too large for a `Decimal` are rejected
/// instead of overflowing.
pub fn calculate_totals(
    lines: &[LineItem],
    tax_rate: Decimal,
    discount_rate: Decimal,
) -> ShopResult<InvoiceTotals> {
    let too_large = || ShopError::Invalid("Invoice total is too large".to_string());

    let mut subtotal = Decimal::ZERO;
    for line in lines {
        let line_total = line.checked_line_total().ok_or_else(too_large)?;
        subtotal = subtotal.checked_add(line_total).ok_or_else(too_large)?;
    }
    let tax = percent_of(subtotal, tax_rate).ok_or_else(too_large)?;
    let discount = percent_of(subtotal, discount_rate).ok_or_else(too_large)?;
    let raw_total = subtotal
        .checked_add(tax)
        .and_then(|t| t.checked_sub(discount))
        .ok_or_else(too_large)?;
    let total = round_to_ten(raw_total).ok_or_else(too_large)?;

    Ok(InvoiceTotals {
        subtotal: subtotal.normalize(),
        tax: tax.normalize(),
        discount: discount.normalize(),
        total: total.normalize(),
    })
}

fn percent_of(amount: Decimal, rate: Decimal) -> Option<Decimal> {
    amount.checked_mul(rate)?.checked_div(HUNDRED)
}

/// Round to the nearest whole amount (ties away from zero), then apply the
/// last-digit policy. The digit is the euclidean remainder, so negative
/// amounts snap the same way on the number line as positive ones.
///
/// `None` when snapping up or down leaves the `Decimal` range.
pub fn round_to_ten(raw_total: Decimal) -> Option<Decimal> {
    let rounded = raw_total.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let ten = Decimal::TEN;
    let digit = ((rounded % ten) + ten) % ten;

    if digit == Decimal::from(5) {
        return Some(rounded);
    }
    let lower = rounded.checked_sub(digit)?;
    if digit < Decimal::from(5) {
        Some(lower)
    } else {
        lower.checked_add(ten)
    }
}
