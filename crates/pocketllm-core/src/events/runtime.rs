//! Runtime lifecycle and generation progress events.

use super::AppEvent;
use crate::domain::{ArtifactId, RuntimeState};

impl AppEvent {
    /// Create a model loaded event.
    pub fn model_loaded(artifact_id: ArtifactId, model_name: impl Into<String>) -> Self {
        Self::ModelLoaded {
            artifact_id,
            model_name: model_name.into(),
        }
    }

    /// Create a model unloaded event.
    pub fn model_unloaded(artifact_id: ArtifactId, model_name: impl Into<String>) -> Self {
        Self::ModelUnloaded {
            artifact_id,
            model_name: model_name.into(),
        }
    }

    /// Create a runtime state change event.
    pub const fn state_changed(from: RuntimeState, to: RuntimeState) -> Self {
        Self::RuntimeStateChanged { from, to }
    }

    /// Create a generation progress event. `percent` is clamped to 100.
    pub fn generation_progress(topic: impl Into<String>, percent: u8) -> Self {
        Self::GenerationProgress {
            topic: topic.into(),
            percent: percent.min(100),
        }
    }
}
