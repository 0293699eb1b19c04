//! Customer operations.

use crate::models::{
    CreateCustomer, Customer, CustomerWithCounts, ListCustomersFilter, UpdateCustomer,
};
use crate::services::database::Database;
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

const CUSTOMER_COLUMNS: &str = "customer_id, name, email, phone, company, address, city, state, \
                                zip, notes, customer_type, created_utc, updated_utc";

impl Database {
    /// Create a new customer.
    #[instrument(skip(self, input))]
    pub async fn create_customer(&self, input: &CreateCustomer) -> Result<Customer, AppError> {
        input.validate()?;
        if input.name.trim().is_empty() {
            return Err(AppError::ValidationError(anyhow::anyhow!(
                "Customer name is required"
            )));
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_customer"])
            .start_timer();

        let customer_id = Uuid::new_v4();
        let customer_type = input
            .customer_type
            .unwrap_or(crate::models::CustomerType::Residential);
        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            INSERT INTO customers (customer_id, name, email, phone, company, address, city, state, zip, notes, customer_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {CUSTOMER_COLUMNS}
            "#,
        ))
        .bind(customer_id)
        .bind(input.name.trim())
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.company)
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.zip)
        .bind(&input.notes)
        .bind(customer_type.as_str())
        .fetch_one(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create customer: {}", e)))?;

        timer.observe_duration();

        info!(customer_id = %customer.customer_id, "Customer created");

        Ok(customer)
    }

    /// Get a customer by ID.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn get_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE customer_id = $1",
        ))
        .bind(customer_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get customer: {}", e)))?;

        timer.observe_duration();

        Ok(customer)
    }

    /// List customers with dependent-record counts. Search matches name,
    /// email, company, and phone.
    #[instrument(skip(self, filter))]
    pub async fn list_customers(
        &self,
        filter: &ListCustomersFilter,
    ) -> Result<Vec<CustomerWithCounts>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_customers"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let type_str = filter.customer_type.map(|t| t.as_str().to_string());
        let search = filter.search.as_deref().map(|s| format!("%{}%", s));

        let customers = sqlx::query_as::<_, CustomerWithCounts>(
            r#"
            SELECT c.customer_id, c.name, c.email, c.phone, c.company, c.address, c.city, c.state,
                   c.zip, c.notes, c.customer_type, c.created_utc, c.updated_utc,
                   (SELECT COUNT(*) FROM jobs j WHERE j.customer_id = c.customer_id) AS job_count,
                   (SELECT COUNT(*) FROM invoices i WHERE i.customer_id = c.customer_id) AS invoice_count
            FROM customers c
            WHERE ($1::text IS NULL
                   OR c.name ILIKE $1 OR c.email ILIKE $1 OR c.company ILIKE $1 OR c.phone ILIKE $1)
              AND ($2::text IS NULL OR c.customer_type = $2)
              AND ($3::uuid IS NULL OR c.customer_id > $3)
            ORDER BY c.customer_id
            LIMIT $4
            "#,
        )
        .bind(&search)
        .bind(&type_str)
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list customers: {}", e)))?;

        timer.observe_duration();

        Ok(customers)
    }

    /// Update a customer.
    #[instrument(skip(self, input), fields(customer_id = %customer_id))]
    pub async fn update_customer(
        &self,
        customer_id: Uuid,
        input: &UpdateCustomer,
    ) -> Result<Option<Customer>, AppError> {
        input.validate()?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_customer"])
            .start_timer();

        let type_str = input.customer_type.map(|t| t.as_str().to_string());
        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customers
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                company = COALESCE($5, company),
                address = COALESCE($6, address),
                city = COALESCE($7, city),
                state = COALESCE($8, state),
                zip = COALESCE($9, zip),
                notes = COALESCE($10, notes),
                customer_type = COALESCE($11, customer_type),
                updated_utc = NOW()
            WHERE customer_id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "#,
        ))
        .bind(customer_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.company)
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.zip)
        .bind(&input.notes)
        .bind(&type_str)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update customer: {}", e)))?;

        timer.observe_duration();

        Ok(customer)
    }

    /// Delete a customer. Rejected while the customer still owns jobs or
    /// invoices.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn delete_customer(&self, customer_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_customer"])
            .start_timer();

        let counts: Option<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT (SELECT COUNT(*) FROM jobs WHERE customer_id = c.customer_id),
                   (SELECT COUNT(*) FROM invoices WHERE customer_id = c.customer_id)
            FROM customers c
            WHERE c.customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to check customer: {}", e)))?;

        let Some((job_count, invoice_count)) = counts else {
            return Ok(false);
        };

        if job_count > 0 || invoice_count > 0 {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Cannot delete customer with existing jobs or invoices"
            )));
        }

        let result = sqlx::query("DELETE FROM customers WHERE customer_id = $1")
            .bind(customer_id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete customer: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(customer_id = %customer_id, "Customer deleted");
        }

        Ok(deleted)
    }
}
