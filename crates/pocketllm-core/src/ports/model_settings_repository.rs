//! Per-model settings repository trait definition.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::ModelSettings;

/// Repository for `ModelSettings`, keyed by model name.
#[async_trait]
pub trait ModelSettingsRepository: Send + Sync {
    /// Settings for a model, or `None` if none are stored.
    async fn get(&self, model_name: &str) -> Result<Option<ModelSettings>, RepositoryError>;

    /// Insert or replace the settings for `settings.model_name`.
    async fn save(&self, settings: &ModelSettings) -> Result<(), RepositoryError>;

    /// Remove the settings for a model. Missing entries are not an error.
    async fn delete(&self, model_name: &str) -> Result<(), RepositoryError>;

    /// All stored settings.
    async fn list(&self) -> Result<Vec<ModelSettings>, RepositoryError>;
}
