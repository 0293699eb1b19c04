//! Crew member operations.

use crate::models::{
    CreateCrewMember, CrewMember, CrewMemberWithAssignments, UpdateCrewMember,
};
use crate::services::database::Database;
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

const CREW_COLUMNS: &str = "crew_id, name, phone, email, role, hourly_rate, active, created_utc";

impl Database {
    /// Create a new crew member.
    #[instrument(skip(self, input))]
    pub async fn create_crew_member(
        &self,
        input: &CreateCrewMember,
    ) -> Result<CrewMember, AppError> {
        input.validate()?;
        if input.name.trim().is_empty() {
            return Err(AppError::ValidationError(anyhow::anyhow!(
                "Crew member name is required"
            )));
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_crew_member"])
            .start_timer();

        let crew_id = Uuid::new_v4();
        let member = sqlx::query_as::<_, CrewMember>(&format!(
            r#"
            INSERT INTO crew_members (crew_id, name, phone, email, role, hourly_rate)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CREW_COLUMNS}
            "#,
        ))
        .bind(crew_id)
        .bind(input.name.trim())
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.role)
        .bind(input.hourly_rate)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create crew member: {}", e))
        })?;

        timer.observe_duration();

        info!(crew_id = %member.crew_id, "Crew member created");

        Ok(member)
    }

    /// Get a crew member by ID.
    #[instrument(skip(self), fields(crew_id = %crew_id))]
    pub async fn get_crew_member(&self, crew_id: Uuid) -> Result<Option<CrewMember>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_crew_member"])
            .start_timer();

        let member = sqlx::query_as::<_, CrewMember>(&format!(
            "SELECT {CREW_COLUMNS} FROM crew_members WHERE crew_id = $1",
        ))
        .bind(crew_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get crew member: {}", e)))?;

        timer.observe_duration();

        Ok(member)
    }

    /// List crew members with their assignment counts, ordered by name.
    #[instrument(skip(self))]
    pub async fn list_crew_members(
        &self,
        active_only: bool,
    ) -> Result<Vec<CrewMemberWithAssignments>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_crew_members"])
            .start_timer();

        let members = sqlx::query_as::<_, CrewMemberWithAssignments>(
            r#"
            SELECT c.crew_id, c.name, c.phone, c.email, c.role, c.hourly_rate, c.active, c.created_utc,
                   (SELECT COUNT(*) FROM job_crew jc WHERE jc.crew_id = c.crew_id) AS assignment_count
            FROM crew_members c
            WHERE ($1::bool = FALSE OR c.active = TRUE)
            ORDER BY c.name
            "#,
        )
        .bind(active_only)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list crew members: {}", e))
        })?;

        timer.observe_duration();

        Ok(members)
    }

    /// Update a crew member.
    #[instrument(skip(self, input), fields(crew_id = %crew_id))]
    pub async fn update_crew_member(
        &self,
        crew_id: Uuid,
        input: &UpdateCrewMember,
    ) -> Result<Option<CrewMember>, AppError> {
        input.validate()?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_crew_member"])
            .start_timer();

        let member = sqlx::query_as::<_, CrewMember>(&format!(
            r#"
            UPDATE crew_members
            SET name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                email = COALESCE($4, email),
                role = COALESCE($5, role),
                hourly_rate = COALESCE($6, hourly_rate),
                active = COALESCE($7, active)
            WHERE crew_id = $1
            RETURNING {CREW_COLUMNS}
            "#,
        ))
        .bind(crew_id)
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.role)
        .bind(input.hourly_rate)
        .bind(input.active)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update crew member: {}", e))
        })?;

        timer.observe_duration();

        Ok(member)
    }

    /// Deactivate a crew member. Crew are never hard-deleted; assignment
    /// history keeps pointing at the row.
    #[instrument(skip(self), fields(crew_id = %crew_id))]
    pub async fn deactivate_crew_member(&self, crew_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["deactivate_crew_member"])
            .start_timer();

        let result = sqlx::query("UPDATE crew_members SET active = FALSE WHERE crew_id = $1")
            .bind(crew_id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to deactivate crew member: {}", e))
            })?;

        timer.observe_duration();

        let deactivated = result.rows_affected() > 0;
        if deactivated {
            info!(crew_id = %crew_id, "Crew member deactivated");
        }

        Ok(deactivated)
    }
}
