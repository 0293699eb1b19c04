//! Company settings: a small key/value store consumed by the email
//! notifier (company identity, work-order inbox, payment terms).

use crate::models::Setting;
use crate::services::database::Database;
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use std::collections::HashMap;
use tracing::instrument;

impl Database {
    /// List all settings.
    #[instrument(skip(self))]
    pub async fn list_settings(&self) -> Result<Vec<Setting>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_settings"])
            .start_timer();

        let settings = sqlx::query_as::<_, Setting>(
            "SELECT key, value, updated_utc FROM settings ORDER BY key",
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list settings: {}", e)))?;

        timer.observe_duration();

        Ok(settings)
    }

    /// Load settings as a key/value map.
    pub async fn settings_map(&self) -> Result<HashMap<String, String>, AppError> {
        let settings = self.list_settings().await?;
        Ok(settings.into_iter().map(|s| (s.key, s.value)).collect())
    }

    /// Insert or update a setting.
    #[instrument(skip(self, value))]
    pub async fn upsert_setting(&self, key: &str, value: &str) -> Result<Setting, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_setting"])
            .start_timer();

        let setting = sqlx::query_as::<_, Setting>(
            r#"
            INSERT INTO settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key)
            DO UPDATE SET value = EXCLUDED.value, updated_utc = NOW()
            RETURNING key, value, updated_utc
            "#,
        )
        .bind(key)
        .bind(value)
        .fetch_one(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to upsert setting: {}", e)))?;

        timer.observe_duration();

        Ok(setting)
    }
}
