//! Storage port for the global settings blob.

use async_trait::async_trait;

use super::RepositoryError;
use crate::settings::Settings;

/// One row of global settings, stored as JSON.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Stored settings, or `Settings::with_defaults()` on a fresh catalog.
    async fn load(&self) -> Result<Settings, RepositoryError>;

    /// Replace the stored settings.
    async fn save(&self, settings: &Settings) -> Result<(), RepositoryError>;
}
