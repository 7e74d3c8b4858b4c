//! Inference configuration types.
//!
//! `InferenceConfig` is reused at every level of the parameter hierarchy:
//! request overrides, per-model settings and global defaults.

use serde::{Deserialize, Serialize};

/// Sampling parameters for a generation.
///
/// Unset fields fall through, in order, to the model's stored settings,
/// the global `default_inference`, then [`Self::with_hardcoded_defaults`].
///
/// # Examples
///
/// ```rust
/// use pocketllm_core::domain::InferenceConfig;
///
/// let mut request = InferenceConfig {
///     temperature: Some(0.8),
///     ..Default::default()
/// };
/// request.merge_with(&InferenceConfig::with_hardcoded_defaults());
/// assert_eq!(request.temperature, Some(0.8));
/// assert_eq!(request.max_tokens, Some(1024));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct InferenceConfig {
    /// 0.0 to 2.0.
    pub temperature: Option<f32>,
    /// 0.0 to 1.0.
    pub top_p: Option<f32>,
    pub top_k: Option<i32>,
    /// Also the denominator of token-based generation progress.
    pub max_tokens: Option<u32>,
    pub repeat_penalty: Option<f32>,
    /// Sequences that end generation when produced.
    pub stop: Option<Vec<String>>,
}

impl InferenceConfig {
    /// Fill every unset field from `fallback`.
    pub fn merge_with(&mut self, fallback: &Self) {
        self.temperature = self.temperature.or(fallback.temperature);
        self.top_p = self.top_p.or(fallback.top_p);
        self.top_k = self.top_k.or(fallback.top_k);
        self.max_tokens = self.max_tokens.or(fallback.max_tokens);
        self.repeat_penalty = self.repeat_penalty.or(fallback.repeat_penalty);
        if self.stop.is_none() {
            self.stop.clone_from(&fallback.stop);
        }
    }

    /// Hardcoded fallback values used when nothing else is configured.
    #[must_use]
    pub const fn with_hardcoded_defaults() -> Self {
        Self {
            temperature: Some(0.7),
            top_p: Some(0.95),
            top_k: Some(40),
            max_tokens: Some(1024),
            repeat_penalty: Some(1.1),
            stop: None,
        }
    }

    /// Resolve a fully-populated config from the hierarchy.
    pub fn resolve(request: &Self, model: Option<&Self>, global: Option<&Self>) -> Self {
        let mut resolved = request.clone();
        if let Some(model) = model {
            resolved.merge_with(model);
        }
        if let Some(global) = global {
            resolved.merge_with(global);
        }
        resolved.merge_with(&Self::with_hardcoded_defaults());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_leaves_rest_unset() {
        let config: InferenceConfig = serde_json::from_str(r#"{"max_tokens": 32}"#).unwrap();
        assert_eq!(config.max_tokens, Some(32));
        assert_eq!(config, InferenceConfig { max_tokens: Some(32), ..Default::default() });
    }

    #[test]
    fn test_merge_with_prefers_self() {
        let mut request = InferenceConfig {
            temperature: Some(0.8),
            ..Default::default()
        };
        let model_defaults = InferenceConfig {
            temperature: Some(0.5),
            top_p: Some(0.9),
            top_k: Some(50),
            ..Default::default()
        };

        request.merge_with(&model_defaults);

        assert_eq!(request.temperature, Some(0.8));
        assert_eq!(request.top_p, Some(0.9));
        assert_eq!(request.top_k, Some(50));
        assert!(request.max_tokens.is_none());
    }

    #[test]
    fn test_resolve_walks_the_hierarchy() {
        let request = InferenceConfig {
            max_tokens: Some(64),
            ..Default::default()
        };
        let model = InferenceConfig {
            temperature: Some(0.2),
            max_tokens: Some(512),
            ..Default::default()
        };
        let global = InferenceConfig {
            temperature: Some(0.9),
            top_k: Some(10),
            stop: Some(vec!["</s>".to_string()]),
            ..Default::default()
        };

        let resolved = InferenceConfig::resolve(&request, Some(&model), Some(&global));

        assert_eq!(resolved.max_tokens, Some(64));
        assert_eq!(resolved.temperature, Some(0.2));
        assert_eq!(resolved.top_k, Some(10));
        assert_eq!(resolved.top_p, Some(0.95));
        assert_eq!(resolved.stop, Some(vec!["</s>".to_string()]));
    }
}
