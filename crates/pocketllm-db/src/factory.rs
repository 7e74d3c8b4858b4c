//! Composition utilities for building repositories with `SQLite` backends.
//!
//! Construction only; no domain logic lives here.

use sqlx::SqlitePool;
use std::sync::Arc;

use pocketllm_core::Repos;

use crate::repositories::{
    SqliteArtifactRepository, SqliteModelSettingsRepository, SqliteSegmentRepository,
    SqliteSettingsRepository,
};

/// Factory for creating repository instances with `SQLite` backends.
pub struct CoreFactory;

impl CoreFactory {
    /// Create a `SQLite` connection pool.
    ///
    /// # Arguments
    ///
    /// * `db_url` - `SQLite` connection URL (e.g., "sqlite:~/.pocketllm/pocketllm.db")
    pub async fn create_pool(db_url: &str) -> anyhow::Result<SqlitePool> {
        let pool = SqlitePool::connect(db_url).await?;
        Ok(pool)
    }

    /// Build all `SQLite` repositories from a pool.
    ///
    /// Returns a `Repos` struct from `pocketllm-core` containing
    /// trait-object-wrapped repositories.
    pub fn build_repos(pool: SqlitePool) -> Repos {
        Repos::new(
            Arc::new(SqliteArtifactRepository::new(pool.clone())),
            Arc::new(SqliteModelSettingsRepository::new(pool.clone())),
            Arc::new(SqliteSegmentRepository::new(pool.clone())),
            Arc::new(SqliteSettingsRepository::new(pool)),
        )
    }

    /// Create an artifact repository from a pool.
    pub fn artifact_repository(pool: SqlitePool) -> Arc<SqliteArtifactRepository> {
        Arc::new(SqliteArtifactRepository::new(pool))
    }

    /// Create a model settings repository from a pool.
    pub fn model_settings_repository(pool: SqlitePool) -> Arc<SqliteModelSettingsRepository> {
        Arc::new(SqliteModelSettingsRepository::new(pool))
    }

    /// Create a thinking segment repository from a pool.
    pub fn segment_repository(pool: SqlitePool) -> Arc<SqliteSegmentRepository> {
        Arc::new(SqliteSegmentRepository::new(pool))
    }

    /// Create a settings repository from a pool.
    pub fn settings_repository(pool: SqlitePool) -> Arc<SqliteSettingsRepository> {
        Arc::new(SqliteSettingsRepository::new(pool))
    }
}

/// Test database helper for integration tests.
///
/// Provides an in-memory `SQLite` database with the production schema applied.
#[cfg(any(test, feature = "test-utils"))]
pub struct TestDb {
    pool: SqlitePool,
}

#[cfg(any(test, feature = "test-utils"))]
impl TestDb {
    /// Create a new in-memory test database with full schema.
    pub async fn new() -> anyhow::Result<Self> {
        let pool = crate::setup::setup_test_database().await?;
        Ok(Self { pool })
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// All repositories backed by this database.
    pub fn repos(&self) -> Repos {
        CoreFactory::build_repos(self.pool.clone())
    }

    /// Create an artifact repository using this test database.
    pub fn artifact_repository(&self) -> SqliteArtifactRepository {
        SqliteArtifactRepository::new(self.pool.clone())
    }

    /// Create a model settings repository using this test database.
    pub fn model_settings_repository(&self) -> SqliteModelSettingsRepository {
        SqliteModelSettingsRepository::new(self.pool.clone())
    }

    /// Create a segment repository using this test database.
    pub fn segment_repository(&self) -> SqliteSegmentRepository {
        SqliteSegmentRepository::new(self.pool.clone())
    }

    /// Create a settings repository using this test database.
    pub fn settings_repository(&self) -> SqliteSettingsRepository {
        SqliteSettingsRepository::new(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocketllm_core::{ModelSettings, ModelSettingsRepository, Settings};

    #[tokio::test]
    async fn test_build_repos_share_one_database() {
        let db = TestDb::new().await.unwrap();
        let repos = db.repos();

        repos
            .model_settings
            .save(&ModelSettings::defaults_for("m", None))
            .await
            .unwrap();
        assert!(
            db.model_settings_repository()
                .get("m")
                .await
                .unwrap()
                .is_some()
        );
        assert_eq!(
            repos.settings.load().await.unwrap(),
            Settings::with_defaults()
        );
    }
}
