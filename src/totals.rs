use rust_decimal::Decimal;

use crate::model::{Discount, InvoiceTotals, LineItem};

/// TVA, 19%.
pub const TAX_RATE: Decimal = Decimal::from_parts(19, 0, 0, false, 2);

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

pub fn compute_totals(items: &[LineItem], discount: Discount, tax_enabled: bool) -> InvoiceTotals {
    let subtotal: Decimal = items.iter().map(LineItem::line_total).sum();

    let discount_amount = match discount {
        Discount::Percentage(pct) => subtotal * pct / HUNDRED,
        Discount::Fixed(amount) => amount,
    };

    // Not clamped: a discount above the subtotal gives a negative base.
    let subtotal_after_discount = subtotal - discount_amount;

    let tax_amount = if tax_enabled {
        subtotal_after_discount * TAX_RATE
    } else {
        Decimal::ZERO
    };

    InvoiceTotals {
        subtotal,
        discount_amount,
        subtotal_after_discount,
        tax_amount,
        grand_total: subtotal_after_discount + tax_amount,
    }
}
