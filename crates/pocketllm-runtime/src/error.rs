//! Runtime error type.
//!
//! `RuntimeError` is everything the inference runtime and the generation
//! orchestrator can report. It is `Clone` because one in-flight load outcome
//! is handed to every caller that joined it.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use pocketllm_core::{CoreError, IntegrityError, RuntimeState};

/// Errors from loading, switching and generating.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    /// The model file failed the integrity gate. Re-import is required.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// The native engine failed to create a context.
    #[error("Failed to load model {path}: {message}")]
    Load { path: PathBuf, message: String },

    /// The path has failed too many times in a row and is refused until
    /// its error state is reset.
    #[error("Refusing to load {path}: {failures} consecutive failures")]
    LoadRefused { path: PathBuf, failures: u32 },

    /// The native completion call failed.
    #[error("Generation failed: {message}")]
    Generation {
        message: String,
        /// The native context was torn down; the model must be loaded again.
        context_invalidated: bool,
    },

    /// No token arrived before the hard timeout.
    #[error("No output from model after {}ms", waited.as_millis())]
    Timeout { waited: Duration },

    /// Another generation is running.
    #[error("A generation is already in progress; retry after {}ms", retry_after.as_millis())]
    Busy { retry_after: Duration },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Invalid runtime transition {from} -> {to}")]
    InvalidTransition { from: RuntimeState, to: RuntimeState },

    /// The requested model is not the one bound to the native context.
    #[error("Model is not loaded")]
    NotLoaded,

    /// Catalog or settings storage failed.
    #[error("Catalog error: {0}")]
    Catalog(String),
}

impl RuntimeError {
    /// Whether the same request may succeed if simply tried again later.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Busy { .. } | Self::Timeout { .. } | Self::Load { .. } | Self::NotLoaded => true,
            Self::Generation {
                context_invalidated,
                ..
            } => !*context_invalidated,
            Self::Integrity(_)
            | Self::LoadRefused { .. }
            | Self::ModelNotFound(_)
            | Self::InvalidTransition { .. }
            | Self::Catalog(_) => false,
        }
    }

    /// Whether the UI should prompt the user to re-import the model.
    pub const fn requires_reimport(&self) -> bool {
        matches!(self, Self::Integrity(_) | Self::LoadRefused { .. })
    }

    /// Stable identifier for mapping errors in a UI layer.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Integrity(_) => "integrity",
            Self::Load { .. } => "load",
            Self::LoadRefused { .. } => "load_refused",
            Self::Generation { .. } => "generation",
            Self::Timeout { .. } => "timeout",
            Self::Busy { .. } => "busy",
            Self::ModelNotFound(_) => "model_not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::NotLoaded => "not_loaded",
            Self::Catalog(_) => "catalog",
        }
    }
}

impl From<CoreError> for RuntimeError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Integrity(e) => Self::Integrity(e),
            e if e.is_not_found() => Self::ModelNotFound(e.to_string()),
            e => Self::Catalog(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocketllm_core::RepositoryError;

    #[test]
    fn test_busy_is_retryable() {
        let err = RuntimeError::Busy {
            retry_after: Duration::from_secs(1),
        };
        assert!(err.is_retryable());
        assert!(!err.requires_reimport());
        assert_eq!(err.kind(), "busy");
        assert!(err.to_string().contains("1000ms"));
    }

    #[test]
    fn test_integrity_requires_reimport() {
        let err: RuntimeError = IntegrityError::Missing(PathBuf::from("/m/a.gguf")).into();
        assert!(err.requires_reimport());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_invalidated_context_is_not_retryable() {
        let err = RuntimeError::Generation {
            message: "context lost".into(),
            context_invalidated: true,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_core_error() {
        let err: RuntimeError = CoreError::Repository(RepositoryError::NotFound("x".into())).into();
        assert_eq!(err.kind(), "model_not_found");

        let err: RuntimeError = CoreError::Internal("disk".into()).into();
        assert_eq!(err.kind(), "catalog");
    }
}
