//! Settings domain types and validation.
//!
//! Global settings hold the tunable runtime policy (timeouts, failure
//! threshold, integrity limits) plus default generation parameters. They are
//! persisted as a single blob and resolved into a [`RuntimePolicy`] at
//! startup.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::InferenceConfig;

/// Token silence after the first token that ends a generation with a
/// partial result.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 5_000;

/// Time without any token after which a generation fails.
pub const DEFAULT_HARD_TIMEOUT_MS: u64 = 60_000;

/// How long a native cancel is given before the result is forced.
pub const DEFAULT_STOP_GRACE_MS: u64 = 1_500;

/// Retry-after hint attached to `Busy` rejections.
pub const DEFAULT_BUSY_RETRY_AFTER_MS: u64 = 1_000;

/// Consecutive failed loads after which a path is refused.
pub const DEFAULT_MAX_LOAD_FAILURES: u32 = 3;

/// Smallest file accepted as a model.
pub const DEFAULT_MIN_MODEL_SIZE_BYTES: u64 = 1024 * 1024;

/// Context length requested when neither the model nor its settings name one.
pub const DEFAULT_CONTEXT_SIZE: u64 = 2048;

/// Application settings structure.
///
/// All fields are optional to support partial updates and graceful defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub idle_timeout_ms: Option<u64>,
    pub hard_timeout_ms: Option<u64>,
    pub stop_grace_ms: Option<u64>,
    pub busy_retry_after_ms: Option<u64>,
    pub max_load_failures: Option<u32>,
    pub min_model_size_bytes: Option<u64>,

    /// Default context size for models (e.g., 2048, 8192).
    pub default_context_size: Option<u64>,

    /// Delete a model file that fails the integrity gate.
    pub remove_corrupt_files: Option<bool>,

    /// Global generation defaults, below per-model settings.
    pub default_inference: Option<InferenceConfig>,
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            idle_timeout_ms: Some(DEFAULT_IDLE_TIMEOUT_MS),
            hard_timeout_ms: Some(DEFAULT_HARD_TIMEOUT_MS),
            stop_grace_ms: Some(DEFAULT_STOP_GRACE_MS),
            busy_retry_after_ms: Some(DEFAULT_BUSY_RETRY_AFTER_MS),
            max_load_failures: Some(DEFAULT_MAX_LOAD_FAILURES),
            min_model_size_bytes: Some(DEFAULT_MIN_MODEL_SIZE_BYTES),
            default_context_size: Some(DEFAULT_CONTEXT_SIZE),
            remove_corrupt_files: Some(false),
            default_inference: Some(InferenceConfig::with_hardcoded_defaults()),
        }
    }

    /// Resolve the concrete policy, falling back to defaults per field.
    #[must_use]
    pub fn runtime_policy(&self) -> RuntimePolicy {
        RuntimePolicy {
            idle_timeout: Duration::from_millis(
                self.idle_timeout_ms.unwrap_or(DEFAULT_IDLE_TIMEOUT_MS),
            ),
            hard_timeout: Duration::from_millis(
                self.hard_timeout_ms.unwrap_or(DEFAULT_HARD_TIMEOUT_MS),
            ),
            stop_grace: Duration::from_millis(self.stop_grace_ms.unwrap_or(DEFAULT_STOP_GRACE_MS)),
            busy_retry_after: Duration::from_millis(
                self.busy_retry_after_ms
                    .unwrap_or(DEFAULT_BUSY_RETRY_AFTER_MS),
            ),
            max_load_failures: self.max_load_failures.unwrap_or(DEFAULT_MAX_LOAD_FAILURES),
            min_model_size_bytes: self
                .min_model_size_bytes
                .unwrap_or(DEFAULT_MIN_MODEL_SIZE_BYTES),
            default_context_size: self.default_context_size.unwrap_or(DEFAULT_CONTEXT_SIZE),
            remove_corrupt_files: self.remove_corrupt_files.unwrap_or(false),
        }
    }

    /// Merge another settings into this one, only updating fields that are Some.
    pub fn merge(&mut self, other: &SettingsUpdate) {
        if let Some(value) = other.idle_timeout_ms {
            self.idle_timeout_ms = value;
        }
        if let Some(value) = other.hard_timeout_ms {
            self.hard_timeout_ms = value;
        }
        if let Some(value) = other.stop_grace_ms {
            self.stop_grace_ms = value;
        }
        if let Some(value) = other.busy_retry_after_ms {
            self.busy_retry_after_ms = value;
        }
        if let Some(value) = other.max_load_failures {
            self.max_load_failures = value;
        }
        if let Some(value) = other.min_model_size_bytes {
            self.min_model_size_bytes = value;
        }
        if let Some(value) = other.default_context_size {
            self.default_context_size = value;
        }
        if let Some(value) = other.remove_corrupt_files {
            self.remove_corrupt_files = value;
        }
        if let Some(ref value) = other.default_inference {
            self.default_inference.clone_from(value);
        }
    }
}

/// Partial settings update.
///
/// Each field is `Option<Option<T>>`:
/// - `None` = don't change this field
/// - `Some(None)` = set field to None/null
/// - `Some(Some(value))` = set field to value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub idle_timeout_ms: Option<Option<u64>>,
    pub hard_timeout_ms: Option<Option<u64>>,
    pub stop_grace_ms: Option<Option<u64>>,
    pub busy_retry_after_ms: Option<Option<u64>>,
    pub max_load_failures: Option<Option<u32>>,
    pub min_model_size_bytes: Option<Option<u64>>,
    pub default_context_size: Option<Option<u64>>,
    pub remove_corrupt_files: Option<Option<bool>>,
    pub default_inference: Option<Option<InferenceConfig>>,
}

/// Concrete runtime policy with every value resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePolicy {
    pub idle_timeout: Duration,
    pub hard_timeout: Duration,
    pub stop_grace: Duration,
    pub busy_retry_after: Duration,
    pub max_load_failures: u32,
    pub min_model_size_bytes: u64,
    pub default_context_size: u64,
    pub remove_corrupt_files: bool,
}

impl Default for RuntimePolicy {
    fn default() -> Self {
        Settings::with_defaults().runtime_policy()
    }
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum SettingsError {
    #[error("Context size must be between 512 and 1,000,000, got {0}")]
    InvalidContextSize(u64),

    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },

    #[error("Idle timeout ({idle_ms} ms) must not exceed hard timeout ({hard_ms} ms)")]
    IdleExceedsHard { idle_ms: u64, hard_ms: u64 },

    #[error("Max load failures must be between 1 and 100, got {0}")]
    InvalidMaxFailures(u32),

    #[error("Temperature must be between 0.0 and 2.0, got {0}")]
    InvalidTemperature(f32),

    #[error("Top-p must be between 0.0 and 1.0, got {0}")]
    InvalidTopP(f32),

    #[error("Max tokens must be greater than zero")]
    ZeroMaxTokens,
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if let Some(ctx_size) = settings.default_context_size {
        if !(512..=1_000_000).contains(&ctx_size) {
            return Err(SettingsError::InvalidContextSize(ctx_size));
        }
    }

    for (name, value) in [
        ("idle_timeout_ms", settings.idle_timeout_ms),
        ("hard_timeout_ms", settings.hard_timeout_ms),
        ("stop_grace_ms", settings.stop_grace_ms),
    ] {
        if value == Some(0) {
            return Err(SettingsError::ZeroDuration { name });
        }
    }

    if let (Some(idle_ms), Some(hard_ms)) = (settings.idle_timeout_ms, settings.hard_timeout_ms) {
        if idle_ms > hard_ms {
            return Err(SettingsError::IdleExceedsHard { idle_ms, hard_ms });
        }
    }

    if let Some(max) = settings.max_load_failures {
        if !(1..=100).contains(&max) {
            return Err(SettingsError::InvalidMaxFailures(max));
        }
    }

    if let Some(ref inference) = settings.default_inference {
        validate_inference(inference)?;
    }

    Ok(())
}

/// Validate generation parameter ranges.
pub fn validate_inference(config: &InferenceConfig) -> Result<(), SettingsError> {
    if let Some(temp) = config.temperature {
        if !(0.0..=2.0).contains(&temp) {
            return Err(SettingsError::InvalidTemperature(temp));
        }
    }
    if let Some(top_p) = config.top_p {
        if !(0.0..=1.0).contains(&top_p) {
            return Err(SettingsError::InvalidTopP(top_p));
        }
    }
    if config.max_tokens == Some(0) {
        return Err(SettingsError::ZeroMaxTokens);
    }
    Ok(())
}
