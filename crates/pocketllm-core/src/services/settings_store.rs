//! Settings store - per-model generation parameters and global settings.
//!
//! Per-model settings are keyed by model name and also mirror the runtime's
//! load state (`is_loaded`, `load_progress`). None of this ever feeds the
//! artifact identity.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::{InferenceConfig, ModelSettings, ModelSettingsUpdate};
use crate::ports::{CoreError, ModelSettingsRepository, SettingsRepository};
use crate::settings::{Settings, SettingsUpdate, validate_inference, validate_settings};

/// Service for per-model and global settings.
#[derive(Clone)]
pub struct SettingsStore {
    models: Arc<dyn ModelSettingsRepository>,
    global: Arc<dyn SettingsRepository>,
}

impl SettingsStore {
    /// Create a new settings store.
    pub fn new(
        models: Arc<dyn ModelSettingsRepository>,
        global: Arc<dyn SettingsRepository>,
    ) -> Self {
        Self { models, global }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Per-model settings
    // ─────────────────────────────────────────────────────────────────────────

    /// Create default settings for a model if none exist.
    ///
    /// Returns the stored settings and whether they were created by this call.
    pub async fn ensure_defaults(
        &self,
        model_name: &str,
        download_source: Option<String>,
    ) -> Result<(ModelSettings, bool), CoreError> {
        if let Some(existing) = self.models.get(model_name).await? {
            return Ok((existing, false));
        }
        let settings = ModelSettings::defaults_for(model_name, download_source);
        self.models.save(&settings).await?;
        debug!(model = %model_name, "Created default model settings");
        Ok((settings, true))
    }

    /// Settings for a model, if any are stored.
    pub async fn get(&self, model_name: &str) -> Result<Option<ModelSettings>, CoreError> {
        Ok(self.models.get(model_name).await?)
    }

    /// Settings for a model, falling back to unsaved defaults.
    pub async fn get_or_default(&self, model_name: &str) -> Result<ModelSettings, CoreError> {
        Ok(self
            .models
            .get(model_name)
            .await?
            .unwrap_or_else(|| ModelSettings::defaults_for(model_name, None)))
    }

    /// All stored per-model settings.
    pub async fn list(&self) -> Result<Vec<ModelSettings>, CoreError> {
        Ok(self.models.list().await?)
    }

    /// Apply a partial update to a model's generation parameters.
    pub async fn update(
        &self,
        model_name: &str,
        update: &ModelSettingsUpdate,
    ) -> Result<ModelSettings, CoreError> {
        let mut settings = self.get_or_default(model_name).await?;
        settings.apply(update);
        validate_inference(&settings.inference)?;
        if settings.threads == Some(0) {
            return Err(CoreError::Validation(
                "threads must be greater than zero".to_string(),
            ));
        }
        settings.updated_at = Utc::now();
        self.models.save(&settings).await?;
        Ok(settings)
    }

    /// Remove the stored settings for a model.
    pub async fn remove(&self, model_name: &str) -> Result<(), CoreError> {
        Ok(self.models.delete(model_name).await?)
    }

    /// Mirror a load or unload into the model's settings.
    pub async fn mark_loaded(
        &self,
        model_name: &str,
        loaded: bool,
        context_length: Option<u64>,
    ) -> Result<(), CoreError> {
        let mut settings = self.get_or_default(model_name).await?;
        settings.is_loaded = loaded;
        settings.load_progress = if loaded { 100 } else { 0 };
        if loaded {
            settings.last_error = None;
            if context_length.is_some() {
                settings.context_length = context_length;
            }
        }
        settings.updated_at = Utc::now();
        self.models.save(&settings).await?;
        Ok(())
    }

    /// Record native load progress (0-100).
    pub async fn set_load_progress(&self, model_name: &str, percent: u8) -> Result<(), CoreError> {
        let mut settings = self.get_or_default(model_name).await?;
        settings.load_progress = percent.min(100);
        settings.updated_at = Utc::now();
        self.models.save(&settings).await?;
        Ok(())
    }

    /// Record a failed load.
    pub async fn record_error(&self, model_name: &str, message: &str) -> Result<(), CoreError> {
        let mut settings = self.get_or_default(model_name).await?;
        settings.is_loaded = false;
        settings.load_progress = 0;
        settings.last_error = Some(message.to_string());
        settings.updated_at = Utc::now();
        self.models.save(&settings).await?;
        Ok(())
    }

    /// Clear `is_loaded` on every model. No native context survives a
    /// restart, so any persisted `true` is stale.
    ///
    /// Returns the number of records corrected.
    pub async fn clear_stale_loaded(&self) -> Result<usize, CoreError> {
        let mut cleared = 0;
        for mut settings in self.models.list().await? {
            if settings.is_loaded || settings.load_progress != 0 {
                settings.is_loaded = false;
                settings.load_progress = 0;
                settings.updated_at = Utc::now();
                self.models.save(&settings).await?;
                cleared += 1;
            }
        }
        if cleared > 0 {
            info!(cleared, "Cleared stale loaded flags from previous run");
        }
        Ok(cleared)
    }

    /// Resolve generation parameters: request → model → global → hardcoded.
    pub async fn resolve_options(
        &self,
        model_name: &str,
        request: &InferenceConfig,
    ) -> Result<InferenceConfig, CoreError> {
        let model = self.models.get(model_name).await?;
        let global = self.global.load().await?;
        Ok(InferenceConfig::resolve(
            request,
            model.as_ref().map(|m| &m.inference),
            global.default_inference.as_ref(),
        ))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Global settings
    // ─────────────────────────────────────────────────────────────────────────

    /// Get current global settings.
    pub async fn global(&self) -> Result<Settings, CoreError> {
        Ok(self.global.load().await?)
    }

    /// Update global settings with partial changes.
    pub async fn update_global(&self, update: &SettingsUpdate) -> Result<Settings, CoreError> {
        let mut current = self.global.load().await?;
        current.merge(update);
        validate_settings(&current)?;
        self.global.save(&current).await?;
        Ok(current)
    }

    /// Save complete global settings (validates first).
    pub async fn save_global(&self, settings: &Settings) -> Result<(), CoreError> {
        validate_settings(settings)?;
        Ok(self.global.save(settings).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryModelSettingsRepository, InMemorySettingsRepository};

    fn store() -> SettingsStore {
        SettingsStore::new(
            Arc::new(InMemoryModelSettingsRepository::new()),
            Arc::new(InMemorySettingsRepository::new()),
        )
    }

    #[tokio::test]
    async fn test_ensure_defaults_is_idempotent() {
        let store = store();
        let (first, created) = store
            .ensure_defaults("Foo-7B", Some("import".to_string()))
            .await
            .unwrap();
        assert!(created);
        assert_eq!(first.download_source.as_deref(), Some("import"));

        let (_, created) = store.ensure_defaults("Foo-7B", None).await.unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn test_mark_loaded_and_unloaded() {
        let store = store();
        store.ensure_defaults("m", None).await.unwrap();
        store.mark_loaded("m", true, Some(4096)).await.unwrap();

        let settings = store.get("m").await.unwrap().unwrap();
        assert!(settings.is_loaded);
        assert_eq!(settings.load_progress, 100);
        assert_eq!(settings.context_length, Some(4096));

        store.mark_loaded("m", false, None).await.unwrap();
        let settings = store.get("m").await.unwrap().unwrap();
        assert!(!settings.is_loaded);
        assert_eq!(settings.context_length, Some(4096));
    }

    #[tokio::test]
    async fn test_record_error_clears_loaded() {
        let store = store();
        store.mark_loaded("m", true, None).await.unwrap();
        store.record_error("m", "out of memory").await.unwrap();
        let settings = store.get("m").await.unwrap().unwrap();
        assert!(!settings.is_loaded);
        assert_eq!(settings.last_error.as_deref(), Some("out of memory"));
    }

    #[tokio::test]
    async fn test_clear_stale_loaded() {
        let store = store();
        store.mark_loaded("a", true, None).await.unwrap();
        store.ensure_defaults("b", None).await.unwrap();
        assert_eq!(store.clear_stale_loaded().await.unwrap(), 1);
        assert!(!store.get("a").await.unwrap().unwrap().is_loaded);
        assert_eq!(store.clear_stale_loaded().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_validates_parameters() {
        let store = store();
        let update = ModelSettingsUpdate {
            temperature: Some(Some(5.0)),
            ..Default::default()
        };
        assert!(matches!(
            store.update("m", &update).await,
            Err(CoreError::Settings(_))
        ));

        let update = ModelSettingsUpdate {
            threads: Some(Some(0)),
            ..Default::default()
        };
        assert!(matches!(
            store.update("m", &update).await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_options_hierarchy() {
        let store = store();
        store
            .update(
                "m",
                &ModelSettingsUpdate {
                    temperature: Some(Some(0.2)),
                    max_tokens: Some(Some(64)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let request = InferenceConfig {
            max_tokens: Some(8),
            ..Default::default()
        };
        let resolved = store.resolve_options("m", &request).await.unwrap();
        assert_eq!(resolved.max_tokens, Some(8));
        assert_eq!(resolved.temperature, Some(0.2));
        assert_eq!(resolved.top_k, Some(40));
    }

    #[tokio::test]
    async fn test_update_global_validates() {
        let store = store();
        let update = SettingsUpdate {
            idle_timeout_ms: Some(Some(0)),
            ..Default::default()
        };
        assert!(store.update_global(&update).await.is_err());

        let update = SettingsUpdate {
            idle_timeout_ms: Some(Some(2_500)),
            ..Default::default()
        };
        let settings = store.update_global(&update).await.unwrap();
        assert_eq!(settings.idle_timeout_ms, Some(2_500));
        assert_eq!(store.global().await.unwrap().idle_timeout_ms, Some(2_500));
    }
}
