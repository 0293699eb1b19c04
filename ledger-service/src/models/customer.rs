//! Customer model for ledger-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Customer classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerType {
    Residential,
    Commercial,
    PropertyManager,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerType::Residential => "RESIDENTIAL",
            CustomerType::Commercial => "COMMERCIAL",
            CustomerType::PropertyManager => "PROPERTY_MANAGER",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "COMMERCIAL" => CustomerType::Commercial,
            "PROPERTY_MANAGER" => CustomerType::PropertyManager,
            _ => CustomerType::Residential,
        }
    }
}

/// Customer record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub customer_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub notes: Option<String>,
    pub customer_type: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Customer row with dependent-record counts, used by listings and the
/// delete guard.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CustomerWithCounts {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub customer: Customer,
    pub job_count: i64,
    pub invoice_count: i64,
}

/// Input for creating a customer.
#[derive(Debug, Clone, Validate)]
pub struct CreateCustomer {
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub notes: Option<String>,
    pub customer_type: Option<CustomerType>,
}

/// Input for updating a customer.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub notes: Option<String>,
    pub customer_type: Option<CustomerType>,
}

/// Filter parameters for listing customers.
#[derive(Debug, Clone, Default)]
pub struct ListCustomersFilter {
    pub search: Option<String>,
    pub customer_type: Option<CustomerType>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
