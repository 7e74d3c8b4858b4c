//! Global settings stored as one JSON row.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use pocketllm_core::{RepositoryError, Settings, SettingsRepository};

use super::row_mappers::{format_timestamp, storage, to_body};

const GLOBAL_KEY: &str = "global";

pub struct SqliteSettingsRepository {
    pool: SqlitePool,
}

impl SqliteSettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for SqliteSettingsRepository {
    async fn load(&self) -> Result<Settings, RepositoryError> {
        let stored: Option<String> = sqlx::query("SELECT value FROM settings_kv WHERE key = ?")
            .bind(GLOBAL_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage(&e))?
            .map(|row| row.try_get::<String, _>("value"))
            .transpose()
            .map_err(|e| storage(&e))?;

        let Some(json) = stored else {
            return Ok(Settings::with_defaults());
        };
        serde_json::from_str(&json).map_err(|e| {
            RepositoryError::Serialization(format!("stored global settings: {e}"))
        })
    }

    async fn save(&self, settings: &Settings) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO settings_kv (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
        )
        .bind(GLOBAL_KEY)
        .bind(to_body(settings)?)
        .bind(format_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| storage(&e))?;
        Ok(())
    }
}
