//! Activity (audit trail) model for ledger-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    JobCreated,
    InvoiceCreated,
    InvoiceSent,
    InvoiceOverdue,
    PaymentReceived,
    StatusChange,
    LineItemsUpdated,
    CrewAssigned,
    CrewRemoved,
    WorkOrderReceived,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::JobCreated => "JOB_CREATED",
            ActivityType::InvoiceCreated => "INVOICE_CREATED",
            ActivityType::InvoiceSent => "INVOICE_SENT",
            ActivityType::InvoiceOverdue => "INVOICE_OVERDUE",
            ActivityType::PaymentReceived => "PAYMENT_RECEIVED",
            ActivityType::StatusChange => "STATUS_CHANGE",
            ActivityType::LineItemsUpdated => "LINE_ITEMS_UPDATED",
            ActivityType::CrewAssigned => "CREW_ASSIGNED",
            ActivityType::CrewRemoved => "CREW_REMOVED",
            ActivityType::WorkOrderReceived => "WORK_ORDER_RECEIVED",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "JOB_CREATED" => ActivityType::JobCreated,
            "INVOICE_CREATED" => ActivityType::InvoiceCreated,
            "INVOICE_SENT" => ActivityType::InvoiceSent,
            "INVOICE_OVERDUE" => ActivityType::InvoiceOverdue,
            "PAYMENT_RECEIVED" => ActivityType::PaymentReceived,
            "LINE_ITEMS_UPDATED" => ActivityType::LineItemsUpdated,
            "CREW_ASSIGNED" => ActivityType::CrewAssigned,
            "CREW_REMOVED" => ActivityType::CrewRemoved,
            "WORK_ORDER_RECEIVED" => ActivityType::WorkOrderReceived,
            _ => ActivityType::StatusChange,
        }
    }
}

/// Append-only audit record. References to jobs/invoices/users are weak:
/// lookup only, `SET NULL` on parent deletion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub activity_id: Uuid,
    pub activity_type: String,
    pub description: String,
    pub job_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}

/// Input for appending an activity record.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub activity_type: ActivityType,
    pub description: String,
    pub job_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
}

impl NewActivity {
    pub fn new(activity_type: ActivityType, description: impl Into<String>) -> Self {
        Self {
            activity_type,
            description: description.into(),
            job_id: None,
            invoice_id: None,
            user_id: None,
            metadata: None,
        }
    }

    pub fn job(mut self, job_id: Uuid) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn invoice(mut self, invoice_id: Uuid) -> Self {
        self.invoice_id = Some(invoice_id);
        self
    }

    pub fn user(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Filter parameters for listing activities.
#[derive(Debug, Clone, Default)]
pub struct ListActivitiesFilter {
    pub job_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub activity_type: Option<ActivityType>,
    pub page_size: i32,
    /// Return only records strictly older than this timestamp.
    pub before: Option<DateTime<Utc>>,
}
