//! Line item models shared by jobs and invoices.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Draft line item as submitted by a caller. `quantity` defaults to 1 and
/// `amount` overrides the computed `quantity * unit_price` when present.
/// Blank-description lines are tolerated here and dropped before
/// persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemInput {
    pub description: String,
    pub quantity: Option<Decimal>,
    pub unit_price: Decimal,
    pub amount: Option<Decimal>,
}

/// Persisted line item on a job.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobLineItem {
    pub line_item_id: Uuid,
    pub job_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}

/// Persisted line item on an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceLineItem {
    pub line_item_id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}
