//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core domain expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No `sqlx` types in any signature
//! - No native binding details leak through the engine port
//! - Traits are minimal and CRUD-focused for repositories

pub mod artifact_repository;
pub mod event_emitter;
pub mod inference_engine;
pub mod model_settings_repository;
pub mod segment_repository;
pub mod settings_repository;

use std::sync::Arc;
use thiserror::Error;

pub use artifact_repository::{ArtifactRepository, ArtifactVersion};
pub use event_emitter::{AppEventEmitter, NoopEmitter};
pub use inference_engine::{
    EngineCompletion, EngineError, EngineErrorKind, EngineLoadParams, EngineModelInfo,
    EngineState, EngineStopReason, InferenceEngine, LoadProgressCallback, TokenCallback,
};
pub use model_settings_repository::ModelSettingsRepository;
pub use segment_repository::SegmentRepository;
pub use settings_repository::SettingsRepository;

use crate::errors::{ImportError, IntegrityError};

/// Container for all repository trait objects.
///
/// This struct provides a consistent way to wire repositories across adapters
/// without coupling them to concrete implementations. It lives in
/// `pocketllm-core` so that services can accept it without depending on
/// `pocketllm-db`.
///
/// # Example
///
/// ```ignore
/// // In pocketllm-db factory:
/// let repos = CoreFactory::build_repos(pool);
///
/// // In a composition root:
/// let services = AppServices::new(repos, engine, models_dir, None).await?;
/// ```
#[derive(Clone)]
pub struct Repos {
    /// Versioned artifact catalog.
    pub artifacts: Arc<dyn ArtifactRepository>,
    /// Per-model generation settings and runtime mirror.
    pub model_settings: Arc<dyn ModelSettingsRepository>,
    /// Content-addressed thinking segments.
    pub segments: Arc<dyn SegmentRepository>,
    /// Global settings.
    pub settings: Arc<dyn SettingsRepository>,
}

impl Repos {
    pub fn new(
        artifacts: Arc<dyn ArtifactRepository>,
        model_settings: Arc<dyn ModelSettingsRepository>,
        segments: Arc<dyn SegmentRepository>,
        settings: Arc<dyn SettingsRepository>,
    ) -> Self {
        Self {
            artifacts,
            model_settings,
            segments,
            settings,
        }
    }
}

/// Storage failure as seen by the services. Adapters map their driver
/// errors into this; nothing driver-specific crosses a port.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// A concurrent write claimed the same key.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored body or timestamp could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored rows contradict each other (e.g. a negative version number).
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Error returned by the core services.
///
/// The runtime wraps it in `RuntimeError::Catalog`; the CLI maps it to an
/// exit code.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Settings(#[from] crate::settings::SettingsError),

    /// Caller input rejected before touching storage.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A collaborator (such as a post-import handler) failed.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether this error means the requested entity does not exist.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Repository(RepositoryError::NotFound(_)))
    }
}
