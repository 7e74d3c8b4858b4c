//! Core domain, ports and services for the pocketllm model runtime.
//!
//! This crate owns everything that does not touch storage or the native
//! inference binding:
//!
//! - `domain` - artifacts and their identity view, settings, generation
//!   values, runtime states, thinking segments
//! - `ports` - repository traits, the native engine port, the event emitter
//! - `services` - the artifact catalog, settings, reasoning extraction and
//!   the post-import task queue
//! - `events` - the canonical event union
//! - `settings` / `paths` - configuration and filesystem layout

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod errors;
pub mod events;
pub mod paths;
pub mod ports;
pub mod services;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use domain::{
    ArtifactId, ArtifactIdentity, ChatMessage, ContentHash, FinishReason, GenerationRequest,
    GenerationResult, ImportRequest, ImportSource, InferenceConfig, LoadedModel, MessageRole,
    ModelArtifact, ModelCapabilities, ModelSettings, ModelSettingsUpdate, OwnerId, ProgressSink,
    Prompt, RequestId, RuntimeState, SegmentKind, StoredSegment, ThinkingSegment,
};
pub use errors::{ImportError, IntegrityError};
pub use events::{AppEvent, Delivery, ModelSummary};
pub use ports::{
    AppEventEmitter, ArtifactRepository, ArtifactVersion, CoreError, EngineCompletion,
    EngineError, EngineErrorKind, EngineLoadParams, EngineModelInfo, EngineState,
    EngineStopReason, InferenceEngine, LoadProgressCallback, ModelSettingsRepository,
    NoopEmitter, Repos, RepositoryError, SegmentRepository, SettingsRepository, TokenCallback,
};
pub use services::{
    ArtifactStore, PostImportHandler, PostImportTask, SettingsStore, TaskQueue,
    ThinkingExtractor, ThinkingFormat, ThinkingRecorder,
};
pub use settings::{RuntimePolicy, Settings, SettingsError, SettingsUpdate, validate_settings};

pub use paths::{
    DirectoryCreationStrategy, ModelsDirSource, PathError, ResolvedPaths, data_root,
    database_path, ensure_directory, models_dir,
};
