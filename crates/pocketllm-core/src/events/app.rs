//! Catalog-level events (model import/removal).

use serde::{Deserialize, Serialize};

use super::AppEvent;
use crate::domain::{ArtifactId, ModelArtifact};

/// Summary of a model for event payloads.
///
/// This is a lightweight representation for events, not the full artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    /// Stable artifact id.
    pub id: ArtifactId,
    /// Human-readable model name.
    pub name: String,
    /// Bare file name inside the managed directory.
    pub filename: String,
    /// Model architecture (e.g., "llama").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    /// Quantization type (e.g., "`Q4_0`").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantization: Option<String>,
    /// Owner token of whoever imported the model.
    pub creator: String,
    pub size: u64,
}

impl From<&ModelArtifact> for ModelSummary {
    fn from(artifact: &ModelArtifact) -> Self {
        Self {
            id: artifact.id.clone(),
            name: artifact.name.clone(),
            filename: artifact.filename.clone(),
            architecture: artifact.architecture.clone(),
            quantization: artifact.quantization.clone(),
            creator: artifact.creator.as_str().to_string(),
            size: artifact.size,
        }
    }
}

impl AppEvent {
    /// Create a model imported event.
    pub const fn model_imported(model: ModelSummary) -> Self {
        Self::ModelImported { model }
    }

    /// Create a catalog refresh event.
    pub const fn models_updated() -> Self {
        Self::ModelsUpdated
    }

    /// Create a model removed event.
    pub const fn model_removed(artifact_id: ArtifactId) -> Self {
        Self::ModelRemoved { artifact_id }
    }
}
