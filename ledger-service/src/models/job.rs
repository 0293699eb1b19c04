//! Job model for ledger-service.

use crate::models::{CrewMember, Invoice, JobLineItem, LineItemInput};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Lead,
    Quoted,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Lead => "LEAD",
            JobStatus::Quoted => "QUOTED",
            JobStatus::Scheduled => "SCHEDULED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "QUOTED" => JobStatus::Quoted,
            "SCHEDULED" => JobStatus::Scheduled,
            "IN_PROGRESS" => JobStatus::InProgress,
            "COMPLETED" => JobStatus::Completed,
            "CANCELLED" => JobStatus::Cancelled,
            _ => JobStatus::Lead,
        }
    }
}

/// Job priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl JobPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPriority::Low => "LOW",
            JobPriority::Medium => "MEDIUM",
            JobPriority::High => "HIGH",
            JobPriority::Urgent => "URGENT",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "LOW" => JobPriority::Low,
            "HIGH" => JobPriority::High,
            "URGENT" => JobPriority::Urgent,
            _ => JobPriority::Medium,
        }
    }
}

/// A unit of field work.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub job_id: Uuid,
    pub job_number: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_amount: Option<Decimal>,
    pub actual_amount: Option<Decimal>,
    pub notes: Option<String>,
    pub is_work_order: bool,
    pub work_order_email: Option<String>,
    pub customer_id: Uuid,
    pub created_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Job with its owned and related records, as returned by the detail
/// lookup.
#[derive(Debug, Clone, Serialize)]
pub struct JobDetail {
    pub job: Job,
    pub line_items: Vec<JobLineItem>,
    pub invoices: Vec<Invoice>,
    pub crew: Vec<CrewMember>,
    pub activities: Vec<crate::models::Activity>,
}

/// Input for creating a job.
#[derive(Debug, Clone, Validate)]
pub struct CreateJob {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<JobStatus>,
    pub priority: Option<JobPriority>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub estimated_amount: Option<Decimal>,
    pub notes: Option<String>,
    pub customer_id: Uuid,
    pub created_by: Option<Uuid>,
    pub is_work_order: bool,
    #[validate(email)]
    pub work_order_email: Option<String>,
    pub line_items: Vec<LineItemInput>,
}

/// Input for updating a job. `line_items` of `Some` replaces the full set;
/// `status` goes through the transition gate.
#[derive(Debug, Clone, Default)]
pub struct UpdateJob {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<JobStatus>,
    pub priority: Option<JobPriority>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_amount: Option<Decimal>,
    pub actual_amount: Option<Decimal>,
    pub notes: Option<String>,
    pub is_work_order: Option<bool>,
    pub work_order_email: Option<String>,
    pub line_items: Option<Vec<LineItemInput>>,
}

/// Filter parameters for listing jobs.
#[derive(Debug, Clone, Default)]
pub struct ListJobsFilter {
    pub search: Option<String>,
    pub status: Option<JobStatus>,
    pub priority: Option<JobPriority>,
    pub customer_id: Option<Uuid>,
    pub is_work_order: Option<bool>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
