//! `SQLite` implementation of the `ModelSettingsRepository` trait.

use async_trait::async_trait;
use sqlx::SqlitePool;

use pocketllm_core::{ModelSettings, ModelSettingsRepository, RepositoryError};

use super::row_mappers::{format_timestamp, from_body, storage, to_body};

/// `SQLite` implementation of the `ModelSettingsRepository` trait.
///
/// One JSON body per model name.
pub struct SqliteModelSettingsRepository {
    pool: SqlitePool,
}

impl SqliteModelSettingsRepository {
    /// Create a new `SQLite` model settings repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModelSettingsRepository for SqliteModelSettingsRepository {
    async fn get(&self, model_name: &str) -> Result<Option<ModelSettings>, RepositoryError> {
        let row = sqlx::query("SELECT body FROM model_settings WHERE model_name = ?")
            .bind(model_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage(&e))?;

        row.as_ref().map(from_body).transpose()
    }

    async fn save(&self, settings: &ModelSettings) -> Result<(), RepositoryError> {
        let body = to_body(settings)?;
        sqlx::query(
            "INSERT OR REPLACE INTO model_settings (model_name, body, updated_at) VALUES (?, ?, ?)",
        )
        .bind(&settings.model_name)
        .bind(&body)
        .bind(format_timestamp(&settings.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| storage(&e))?;
        Ok(())
    }

    async fn delete(&self, model_name: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM model_settings WHERE model_name = ?")
            .bind(model_name)
            .execute(&self.pool)
            .await
            .map_err(|e| storage(&e))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ModelSettings>, RepositoryError> {
        let rows = sqlx::query("SELECT body FROM model_settings ORDER BY model_name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage(&e))?;
        rows.iter().map(from_body).collect()
    }
}
