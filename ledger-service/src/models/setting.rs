//! Company settings model for ledger-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A single key/value company setting (identity, work-order inbox,
/// default tax rate, payment terms).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_utc: DateTime<Utc>,
}
