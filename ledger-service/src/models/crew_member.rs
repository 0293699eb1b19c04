//! Crew member model for ledger-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Field crew member. Never hard-deleted; deactivated instead so job
/// history keeps its references.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CrewMember {
    pub crew_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub hourly_rate: Option<Decimal>,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Crew member with assignment count for listings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CrewMemberWithAssignments {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub crew_member: CrewMember,
    pub assignment_count: i64,
}

/// Input for creating a crew member.
#[derive(Debug, Clone, Validate)]
pub struct CreateCrewMember {
    pub name: String,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub role: Option<String>,
    pub hourly_rate: Option<Decimal>,
}

/// Input for updating a crew member.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateCrewMember {
    pub name: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub role: Option<String>,
    pub hourly_rate: Option<Decimal>,
    pub active: Option<bool>,
}
