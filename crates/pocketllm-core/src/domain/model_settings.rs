//! Per-model settings.
//!
//! `ModelSettings` is keyed by model name and is the mutable companion of
//! an artifact: sampling parameters plus a persisted mirror of the
//! runtime's load state. None of it participates in artifact identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::LoadStatus;
use super::inference::InferenceConfig;

/// Mutable per-model settings and runtime mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSettings {
    /// Name of the model these settings belong to.
    pub model_name: String,
    /// Sampling parameters for this model.
    #[serde(default)]
    pub inference: InferenceConfig,
    /// CPU threads used by the native engine.
    pub threads: Option<u32>,
    /// Context length requested at load time.
    pub context_length: Option<u64>,
    /// Mirror of the runtime's truth; written by the runtime only.
    #[serde(default)]
    pub is_loaded: bool,
    /// Last reported load progress (0-100).
    #[serde(default)]
    pub load_progress: u8,
    /// Where the model file was downloaded from, if known.
    pub download_source: Option<String>,
    /// Most recent load/integrity failure, cleared on successful load.
    pub last_error: Option<String>,
    /// When these settings were last written.
    pub updated_at: DateTime<Utc>,
}

impl ModelSettings {
    /// Default settings created alongside a freshly imported artifact.
    pub fn defaults_for(model_name: impl Into<String>, download_source: Option<String>) -> Self {
        Self {
            model_name: model_name.into(),
            inference: InferenceConfig::default(),
            threads: None,
            context_length: None,
            is_loaded: false,
            load_progress: 0,
            download_source,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    /// The transient status view of these settings.
    pub const fn load_status(&self) -> LoadStatus {
        LoadStatus {
            is_loaded: self.is_loaded,
            load_progress: self.load_progress,
        }
    }
}

/// Partial update of the user-editable part of `ModelSettings`.
///
/// Each field is `Option<Option<T>>`:
/// - `None` = don't change this field
/// - `Some(None)` = clear the field
/// - `Some(Some(value))` = set the field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSettingsUpdate {
    pub temperature: Option<Option<f32>>,
    pub top_p: Option<Option<f32>>,
    pub top_k: Option<Option<i32>>,
    pub max_tokens: Option<Option<u32>>,
    pub repeat_penalty: Option<Option<f32>>,
    pub threads: Option<Option<u32>>,
    pub context_length: Option<Option<u64>>,
}

impl ModelSettings {
    /// Apply a partial update.
    pub fn apply(&mut self, update: &ModelSettingsUpdate) {
        if let Some(value) = update.temperature {
            self.inference.temperature = value;
        }
        if let Some(value) = update.top_p {
            self.inference.top_p = value;
        }
        if let Some(value) = update.top_k {
            self.inference.top_k = value;
        }
        if let Some(value) = update.max_tokens {
            self.inference.max_tokens = value;
        }
        if let Some(value) = update.repeat_penalty {
            self.inference.repeat_penalty = value;
        }
        if let Some(value) = update.threads {
            self.threads = value;
        }
        if let Some(value) = update.context_length {
            self.context_length = value;
        }
        self.updated_at = Utc::now();
    }
}
