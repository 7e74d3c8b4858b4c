//! Core services - the catalog's business logic layer.
//!
//! Services orchestrate between ports (trait interfaces) and domain logic.
//! They don't know about concrete implementations.

mod artifact_store;
mod settings_store;
mod task_queue;
mod thinking;

pub use artifact_store::ArtifactStore;
pub use settings_store::SettingsStore;
pub use task_queue::{PostImportHandler, PostImportTask, TaskQueue};
pub use thinking::{
    ExtractedSegment, Extraction, RecordedThinking, ThinkingExtractor, ThinkingFormat,
    ThinkingRecorder,
};
