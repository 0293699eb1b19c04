//! Append-only activity log.
//!
//! Every mutation in the ledger funnels through here. `insert_activity`
//! takes any executor so callers can append audit rows inside their own
//! transaction; the row then commits or rolls back with the mutation it
//! describes.

use crate::models::{Activity, ListActivitiesFilter, NewActivity};
use crate::services::database::Database;
use crate::services::metrics::{ACTIVITIES_TOTAL, DB_QUERY_DURATION};
use serde_json::json;
use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;

/// Build the `{from, to}` metadata attached to every status change record.
pub fn status_change_metadata(from: &str, to: &str) -> serde_json::Value {
    json!({ "from": from, "to": to })
}

/// Append an activity record using the given executor.
pub(crate) async fn insert_activity<'e, E>(
    executor: E,
    input: &NewActivity,
) -> Result<Activity, AppError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let activity_id = Uuid::new_v4();
    let activity = sqlx::query_as::<_, Activity>(
        r#"
        INSERT INTO activities (activity_id, activity_type, description, job_id, invoice_id, user_id, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING activity_id, activity_type, description, job_id, invoice_id, user_id, metadata, created_utc
        "#,
    )
    .bind(activity_id)
    .bind(input.activity_type.as_str())
    .bind(&input.description)
    .bind(input.job_id)
    .bind(input.invoice_id)
    .bind(input.user_id)
    .bind(&input.metadata)
    .fetch_one(executor)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to log activity: {}", e)))?;

    ACTIVITIES_TOTAL
        .with_label_values(&[input.activity_type.as_str()])
        .inc();

    Ok(activity)
}

impl Database {
    /// Append an activity record outside of any caller transaction.
    #[instrument(skip(self, input), fields(activity_type = input.activity_type.as_str()))]
    pub async fn log_activity(&self, input: &NewActivity) -> Result<Activity, AppError> {
        insert_activity(self.pool(), input).await
    }

    /// List activity records, newest first, optionally filtered by job,
    /// invoice, and type.
    #[instrument(skip(self, filter))]
    pub async fn list_activities(
        &self,
        filter: &ListActivitiesFilter,
    ) -> Result<Vec<Activity>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_activities"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let type_str = filter.activity_type.map(|t| t.as_str().to_string());

        let activities = sqlx::query_as::<_, Activity>(
            r#"
            SELECT activity_id, activity_type, description, job_id, invoice_id, user_id, metadata, created_utc
            FROM activities
            WHERE ($1::uuid IS NULL OR job_id = $1)
              AND ($2::uuid IS NULL OR invoice_id = $2)
              AND ($3::text IS NULL OR activity_type = $3)
              AND ($4::timestamptz IS NULL OR created_utc < $4)
            ORDER BY created_utc DESC
            LIMIT $5
            "#,
        )
        .bind(filter.job_id)
        .bind(filter.invoice_id)
        .bind(&type_str)
        .bind(filter.before)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list activities: {}", e)))?;

        timer.observe_duration();

        Ok(activities)
    }
}
