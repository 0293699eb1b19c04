//! Job operations.

use crate::models::{
    ActivityType, CreateJob, CrewMember, Job, JobDetail, JobLineItem, JobStatus,
    ListActivitiesFilter, ListJobsFilter, NewActivity, UpdateJob,
};
use crate::services::activity::{insert_activity, status_change_metadata};
use crate::services::calculator::normalize_line_items;
use crate::services::database::Database;
use crate::services::metrics::{DB_QUERY_DURATION, JOBS_TOTAL};
use crate::services::notify::{DomainEvent, EventSender};
use crate::services::numbering::{map_number_conflict, next_document_number, JOB_SERIES};
use crate::services::status::job_transition;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

const JOB_COLUMNS: &str = "job_id, job_number, title, description, status, priority, address, \
                           city, state, zip, scheduled_at, completed_at, estimated_amount, \
                           actual_amount, notes, is_work_order, work_order_email, customer_id, \
                           created_by, created_utc, updated_utc";

impl Database {
    /// Create a new job: allocate the next `JOB-` number, persist the job
    /// and its line items, and append the audit records, all in one
    /// transaction. Work-order jobs additionally raise a notification
    /// event after commit.
    #[instrument(skip(self, input, events), fields(customer_id = %input.customer_id))]
    pub async fn create_job(
        &self,
        input: &CreateJob,
        events: &EventSender,
    ) -> Result<Job, AppError> {
        input.validate()?;
        if input.title.trim().is_empty() {
            return Err(AppError::ValidationError(anyhow::anyhow!(
                "Job title is required"
            )));
        }

        if self.get_customer(input.customer_id).await?.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Customer not found")));
        }

        // Jobs may be created without line items (estimates come later);
        // blank lines are still filtered and negatives rejected.
        let line_items = normalize_line_items(&input.line_items)?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_job"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let job_number = next_document_number(&mut tx, JOB_SERIES).await?;
        let status = input.status.unwrap_or(JobStatus::Lead);
        let priority = input
            .priority
            .unwrap_or(crate::models::JobPriority::Medium);

        let job_id = Uuid::new_v4();
        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            INSERT INTO jobs (
                job_id, job_number, title, description, status, priority,
                address, city, state, zip, scheduled_at, estimated_amount, notes,
                is_work_order, work_order_email, customer_id, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {JOB_COLUMNS}
            "#,
        ))
        .bind(job_id)
        .bind(&job_number)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(status.as_str())
        .bind(priority.as_str())
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.zip)
        .bind(input.scheduled_at)
        .bind(input.estimated_amount)
        .bind(&input.notes)
        .bind(input.is_work_order)
        .bind(&input.work_order_email)
        .bind(input.customer_id)
        .bind(input.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_number_conflict(e, "job"))?;

        for (sort_order, item) in line_items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO job_line_items (line_item_id, job_id, description, quantity, unit_price, amount, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(job_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.amount)
            .bind(sort_order as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert line item: {}", e))
            })?;
        }

        insert_activity(
            &mut *tx,
            &NewActivity::new(
                ActivityType::JobCreated,
                format!("Job {} created: {}", job_number, job.title),
            )
            .job(job_id)
            .user(input.created_by),
        )
        .await?;

        if input.is_work_order {
            let source = input
                .work_order_email
                .as_deref()
                .unwrap_or("customer");
            insert_activity(
                &mut *tx,
                &NewActivity::new(
                    ActivityType::WorkOrderReceived,
                    format!("Work order received from {}", source),
                )
                .job(job_id)
                .user(input.created_by),
            )
            .await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        JOBS_TOTAL.with_label_values(&[status.as_str()]).inc();

        info!(job_id = %job.job_id, job_number = %job.job_number, "Job created");

        if input.is_work_order {
            events.publish(DomainEvent::WorkOrderReceived { job_id });
        }

        Ok(job)
    }

    /// Get a job by ID.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_job"])
            .start_timer();

        let job = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = $1",
        ))
        .bind(job_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get job: {}", e)))?;

        timer.observe_duration();

        Ok(job)
    }

    /// Get a job with its line items, invoices, crew, and recent history.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn get_job_detail(&self, job_id: Uuid) -> Result<Option<JobDetail>, AppError> {
        let Some(job) = self.get_job(job_id).await? else {
            return Ok(None);
        };

        let line_items = self.get_job_line_items(job_id).await?;
        let invoices = self.list_invoices_for_job(job_id).await?;
        let crew = self.crew_for_job(job_id).await?;
        let activities = self
            .list_activities(&ListActivitiesFilter {
                job_id: Some(job_id),
                page_size: 50,
                ..Default::default()
            })
            .await?;

        Ok(Some(JobDetail {
            job,
            line_items,
            invoices,
            crew,
            activities,
        }))
    }

    /// Get line items for a job, in insertion order.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn get_job_line_items(&self, job_id: Uuid) -> Result<Vec<JobLineItem>, AppError> {
        let line_items = sqlx::query_as::<_, JobLineItem>(
            r#"
            SELECT line_item_id, job_id, description, quantity, unit_price, amount, sort_order, created_utc
            FROM job_line_items
            WHERE job_id = $1
            ORDER BY sort_order, created_utc
            "#,
        )
        .bind(job_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        Ok(line_items)
    }

    /// Crew members assigned to a job.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn crew_for_job(&self, job_id: Uuid) -> Result<Vec<CrewMember>, AppError> {
        let crew = sqlx::query_as::<_, CrewMember>(
            r#"
            SELECT c.crew_id, c.name, c.phone, c.email, c.role, c.hourly_rate, c.active, c.created_utc
            FROM crew_members c
            JOIN job_crew jc ON jc.crew_id = c.crew_id
            WHERE jc.job_id = $1
            ORDER BY jc.assigned_utc
            "#,
        )
        .bind(job_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get job crew: {}", e)))?;

        Ok(crew)
    }

    /// List jobs. Search matches number, title, and description.
    #[instrument(skip(self, filter))]
    pub async fn list_jobs(&self, filter: &ListJobsFilter) -> Result<Vec<Job>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_jobs"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());
        let priority_str = filter.priority.map(|p| p.as_str().to_string());
        let search = filter.search.as_deref().map(|s| format!("%{}%", s));

        let jobs = sqlx::query_as::<_, Job>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE ($1::text IS NULL
                   OR job_number ILIKE $1 OR title ILIKE $1 OR description ILIKE $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR priority = $3)
              AND ($4::uuid IS NULL OR customer_id = $4)
              AND ($5::bool IS NULL OR is_work_order = $5)
              AND ($6::uuid IS NULL OR job_id > $6)
            ORDER BY job_id
            LIMIT $7
            "#,
        ))
        .bind(&search)
        .bind(&status_str)
        .bind(&priority_str)
        .bind(filter.customer_id)
        .bind(filter.is_work_order)
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list jobs: {}", e)))?;

        timer.observe_duration();

        Ok(jobs)
    }

    /// Update a job. A status change goes through the transition gate and
    /// writes its audit record; `line_items` of `Some` replaces the full
    /// set. Everything commits as one transaction.
    #[instrument(skip(self, input), fields(job_id = %job_id))]
    pub async fn update_job(
        &self,
        job_id: Uuid,
        input: &UpdateJob,
        user_id: Option<Uuid>,
    ) -> Result<Option<Job>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_job"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = $1 FOR UPDATE",
        ))
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get job: {}", e)))?;

        let Some(existing) = existing else {
            return Ok(None);
        };

        let current_status = JobStatus::from_string(&existing.status);
        let applied_status = match input.status {
            Some(requested) => job_transition(current_status, requested)?,
            None => None,
        };
        let status_str = applied_status.map(|s| s.as_str().to_string());

        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            UPDATE jobs
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                status = COALESCE($4, status),
                priority = COALESCE($5, priority),
                address = COALESCE($6, address),
                city = COALESCE($7, city),
                state = COALESCE($8, state),
                zip = COALESCE($9, zip),
                scheduled_at = COALESCE($10, scheduled_at),
                completed_at = COALESCE($11, completed_at),
                estimated_amount = COALESCE($12, estimated_amount),
                actual_amount = COALESCE($13, actual_amount),
                notes = COALESCE($14, notes),
                is_work_order = COALESCE($15, is_work_order),
                work_order_email = COALESCE($16, work_order_email),
                updated_utc = NOW()
            WHERE job_id = $1
            RETURNING {JOB_COLUMNS}
            "#,
        ))
        .bind(job_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&status_str)
        .bind(input.priority.map(|p| p.as_str().to_string()))
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.zip)
        .bind(input.scheduled_at)
        .bind(input.completed_at)
        .bind(input.estimated_amount)
        .bind(input.actual_amount)
        .bind(&input.notes)
        .bind(input.is_work_order)
        .bind(&input.work_order_email)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update job: {}", e)))?;

        if let Some(items) = &input.line_items {
            let normalized = normalize_line_items(items)?;

            sqlx::query("DELETE FROM job_line_items WHERE job_id = $1")
                .bind(job_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to clear line items: {}", e))
                })?;

            for (sort_order, item) in normalized.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO job_line_items (line_item_id, job_id, description, quantity, unit_price, amount, sort_order)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(job_id)
                .bind(&item.description)
                .bind(item.quantity)
                .bind(item.unit_price)
                .bind(item.amount)
                .bind(sort_order as i32)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to insert line item: {}", e))
                })?;
            }

            insert_activity(
                &mut *tx,
                &NewActivity::new(
                    ActivityType::LineItemsUpdated,
                    format!("Job line items replaced ({} items)", normalized.len()),
                )
                .job(job_id)
                .user(user_id),
            )
            .await?;
        }

        if let Some(new_status) = applied_status {
            insert_activity(
                &mut *tx,
                &NewActivity::new(
                    ActivityType::StatusChange,
                    format!("Job status changed to {}", new_status.as_str()),
                )
                .job(job_id)
                .user(user_id)
                .metadata(status_change_metadata(
                    current_status.as_str(),
                    new_status.as_str(),
                )),
            )
            .await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        if let Some(new_status) = applied_status {
            JOBS_TOTAL.with_label_values(&[new_status.as_str()]).inc();
            info!(
                job_id = %job_id,
                from = current_status.as_str(),
                to = new_status.as_str(),
                "Job status changed"
            );
        }

        Ok(Some(job))
    }

    /// Delete a job. Rejected while invoices reference it; line items and
    /// crew assignments cascade.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn delete_job(&self, job_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_job"])
            .start_timer();

        let invoice_count: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM invoices WHERE job_id = j.job_id)
            FROM jobs j
            WHERE j.job_id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to check job: {}", e)))?;

        let Some(invoice_count) = invoice_count else {
            return Ok(false);
        };

        if invoice_count > 0 {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Cannot delete job with existing invoices"
            )));
        }

        let result = sqlx::query("DELETE FROM jobs WHERE job_id = $1")
            .bind(job_id)
            .execute(self.pool())
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete job: {}", e)))?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(job_id = %job_id, "Job deleted");
        }

        Ok(deleted)
    }

    /// Assign a crew member to a job. Re-assigning the same member is a
    /// conflict.
    #[instrument(skip(self), fields(job_id = %job_id, crew_id = %crew_id))]
    pub async fn assign_crew(
        &self,
        job_id: Uuid,
        crew_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<CrewMember, AppError> {
        if self.get_job(job_id).await?.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Job not found")));
        }
        let member = self
            .get_crew_member(crew_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Crew member not found")))?;

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query("INSERT INTO job_crew (job_id, crew_id) VALUES ($1, $2)")
            .bind(job_id)
            .bind(crew_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AppError::Conflict(anyhow::anyhow!("Crew member already assigned"))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to assign crew: {}", e)),
            })?;

        insert_activity(
            &mut *tx,
            &NewActivity::new(
                ActivityType::CrewAssigned,
                format!("{} assigned to job", member.name),
            )
            .job(job_id)
            .user(user_id),
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        info!(job_id = %job_id, crew_id = %crew_id, "Crew member assigned");

        Ok(member)
    }

    /// Remove a crew member from a job.
    #[instrument(skip(self), fields(job_id = %job_id, crew_id = %crew_id))]
    pub async fn remove_crew(
        &self,
        job_id: Uuid,
        crew_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let member = self.get_crew_member(crew_id).await?;

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let result = sqlx::query("DELETE FROM job_crew WHERE job_id = $1 AND crew_id = $2")
            .bind(job_id)
            .bind(crew_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to remove crew: {}", e)))?;

        let removed = result.rows_affected() > 0;
        if removed {
            let name = member.map(|m| m.name).unwrap_or_else(|| "Crew member".to_string());
            insert_activity(
                &mut *tx,
                &NewActivity::new(
                    ActivityType::CrewRemoved,
                    format!("{} removed from job", name),
                )
                .job(job_id)
                .user(user_id),
            )
            .await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        Ok(removed)
    }
}
