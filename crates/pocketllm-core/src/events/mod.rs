//! Canonical event union for everything the runtime tells its collaborators.
//!
//! This module is the single source of truth for events published by the
//! artifact store, the inference runtime and the generation orchestrator.
//!
//! # Structure
//!
//! - `app` - Catalog events (model imported/removed) and their payloads
//! - `runtime` - Load/unload, state-change and generation progress events
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "model_loaded", "artifactId": "5f1c...", "modelName": "Foo-7B" }
//! ```
//!
//! # Delivery
//!
//! Every event kind has a documented [`Delivery`] guarantee. Lifecycle
//! events are reliable; progress updates are lossy.

mod app;
mod runtime;

use serde::{Deserialize, Serialize};

use crate::domain::{ArtifactId, RuntimeState};

pub use app::ModelSummary;

/// Delivery guarantee for an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Delivered exactly once to every reliable subscriber, in publish order.
    Reliable,
    /// At most once; dropped for subscribers that fall behind.
    Lossy,
}

/// Canonical event types.
///
/// Each variant includes all necessary context for the event to be
/// self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    // ========== Catalog Events ==========
    /// A model file was imported into the catalog.
    ModelImported {
        /// Summary of the imported model.
        model: ModelSummary,
    },

    /// The catalog changed in a way list views should refresh for
    /// (metadata refresh, startup recovery).
    ModelsUpdated,

    /// A model was soft-deleted and its file removed.
    ModelRemoved {
        #[serde(rename = "artifactId")]
        artifact_id: ArtifactId,
    },

    // ========== Runtime Events ==========
    /// A native context is ready for this model.
    ModelLoaded {
        #[serde(rename = "artifactId")]
        artifact_id: ArtifactId,
        #[serde(rename = "modelName")]
        model_name: String,
    },

    /// The native context for this model was released.
    ModelUnloaded {
        #[serde(rename = "artifactId")]
        artifact_id: ArtifactId,
        #[serde(rename = "modelName")]
        model_name: String,
    },

    /// The runtime state machine moved.
    RuntimeStateChanged { from: RuntimeState, to: RuntimeState },

    /// Unified progress for one generation request.
    GenerationProgress {
        /// Topic the request was tagged with (request id when untagged).
        topic: String,
        /// 0-100.
        percent: u8,
    },
}

impl AppEvent {
    /// Get the event name for routing and logging.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::ModelImported { .. } => "model:imported",
            Self::ModelsUpdated => "models:updated",
            Self::ModelRemoved { .. } => "model:removed",
            Self::ModelLoaded { .. } => "model:loaded",
            Self::ModelUnloaded { .. } => "model:unloaded",
            Self::RuntimeStateChanged { .. } => "runtime:state_changed",
            Self::GenerationProgress { .. } => "generation:progress",
        }
    }

    /// Delivery guarantee for this event kind.
    pub const fn delivery(&self) -> Delivery {
        match self {
            Self::GenerationProgress { .. } => Delivery::Lossy,
            _ => Delivery::Reliable,
        }
    }
}
