//! Invoice model for ledger-service.

use crate::models::{Activity, InvoiceLineItem, LineItemInput, Payment};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Partial,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Partial => "PARTIAL",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "SENT" => InvoiceStatus::Sent,
            "PARTIAL" => InvoiceStatus::Partial,
            "PAID" => InvoiceStatus::Paid,
            "OVERDUE" => InvoiceStatus::Overdue,
            "CANCELLED" => InvoiceStatus::Cancelled,
            _ => InvoiceStatus::Draft,
        }
    }
}

/// Billing document. Monetary fields satisfy, after every mutation:
/// `total = subtotal + tax_amount` and `balance_due = max(0, total - amount_paid)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub status: String,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub balance_due: Decimal,
    pub notes: Option<String>,
    pub customer_id: Uuid,
    pub job_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Invoice with owned records and recent history, as returned by the
/// detail lookup.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub line_items: Vec<InvoiceLineItem>,
    pub payments: Vec<Payment>,
    pub activities: Vec<Activity>,
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub customer_id: Uuid,
    pub job_id: Option<Uuid>,
    pub issue_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub line_items: Vec<LineItemInput>,
}

/// Input for updating an invoice. `line_items` of `Some` replaces the full
/// set and recomputes totals; `status` goes through the transition gate.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub status: Option<InvoiceStatus>,
    pub issue_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub line_items: Option<Vec<LineItemInput>>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub search: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
