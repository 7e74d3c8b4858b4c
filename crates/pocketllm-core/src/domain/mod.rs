//! Domain types for the pocketllm runtime.
//!
//! These types are pure data structures with no infrastructure dependencies.

pub mod artifact;
pub mod capabilities;
pub mod generation;
pub mod hash;
pub mod inference;
pub mod model_settings;
pub mod runtime;
pub mod thinking;

pub use artifact::{
    ArtifactId, ArtifactIdentity, ArtifactStatusView, ImportRequest, ImportSource, LoadStatus,
    ModelArtifact, OwnerId, bare_filename, contains_path_separator,
};
pub use capabilities::{ModelCapabilities, infer_from_name};
pub use generation::{
    ChatMessage, FinishReason, GenerationRequest, GenerationResult, MessageRole, ProgressSink,
    Prompt, RequestId,
};
pub use hash::{ContentHash, hash_bytes, hash_canonical};
pub use inference::InferenceConfig;
pub use model_settings::{ModelSettings, ModelSettingsUpdate};
pub use runtime::{LoadedModel, RuntimeState};
pub use thinking::{SegmentKind, StoredSegment, ThinkingSegment};
