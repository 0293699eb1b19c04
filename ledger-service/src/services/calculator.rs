//! Monetary calculations for line items and invoice totals.
//!
//! All arithmetic is done in `Decimal`; final amounts are rounded half-up
//! to 2 decimal places.

use crate::models::LineItemInput;
use rust_decimal::{Decimal, RoundingStrategy};
use service_core::error::AppError;

/// Round to currency precision (2 decimal places, half-up).
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A line item after normalization: blank lines dropped, quantity
/// defaulted, amount resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

/// Computed invoice totals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Normalize draft line items: drop blank-description lines (allowed
/// transiently in a draft UI, never persisted), default quantity to 1, and
/// resolve `amount = override ?? round2(quantity * unit_price)`.
pub fn normalize_line_items(items: &[LineItemInput]) -> Result<Vec<NormalizedLineItem>, AppError> {
    let mut normalized = Vec::with_capacity(items.len());

    for item in items {
        let description = item.description.trim();
        if description.is_empty() {
            continue;
        }

        let quantity = item.quantity.unwrap_or(Decimal::ONE);
        if quantity < Decimal::ZERO {
            return Err(AppError::ValidationError(anyhow::anyhow!(
                "Line item quantity cannot be negative"
            )));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(AppError::ValidationError(anyhow::anyhow!(
                "Line item unit price cannot be negative"
            )));
        }

        let amount = match item.amount {
            Some(amount) if amount < Decimal::ZERO => {
                return Err(AppError::ValidationError(anyhow::anyhow!(
                    "Line item amount cannot be negative"
                )));
            }
            Some(amount) => round_currency(amount),
            None => round_currency(quantity * item.unit_price),
        };

        normalized.push(NormalizedLineItem {
            description: description.to_string(),
            quantity,
            unit_price: item.unit_price,
            amount,
        });
    }

    Ok(normalized)
}

/// Compute invoice totals from normalized line items and a flat percent
/// tax rate: `tax_amount = round2(subtotal * tax_rate / 100)`,
/// `total = subtotal + tax_amount`.
pub fn compute_totals(items: &[NormalizedLineItem], tax_rate: Decimal) -> Result<Totals, AppError> {
    if tax_rate < Decimal::ZERO {
        return Err(AppError::ValidationError(anyhow::anyhow!(
            "Tax rate cannot be negative"
        )));
    }

    let subtotal: Decimal = items.iter().map(|item| item.amount).sum();
    let tax_amount = round_currency(subtotal * tax_rate / Decimal::ONE_HUNDRED);
    let total = subtotal + tax_amount;

    Ok(Totals {
        subtotal,
        tax_amount,
        total,
    })
}

/// Format a currency amount the way activity descriptions render it:
/// thousands-separated, always 2 decimal places (`5100` -> `"5,100.00"`).
pub fn format_usd(amount: Decimal) -> String {
    let rounded = round_currency(amount);
    let raw = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded < Decimal::ZERO { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}
