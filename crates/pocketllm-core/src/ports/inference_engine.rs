//! Native inference engine port.
//!
//! The engine is the on-device binding that owns at most one native model
//! context. This port is the only way the runtime talks to it, which keeps
//! the binding swappable and lets tests drive a scripted fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{InferenceConfig, Prompt};

/// Parameters passed to the native loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLoadParams {
    /// Requested context length; the engine may negotiate a smaller one.
    pub context_length: Option<u64>,
    /// CPU threads.
    pub threads: Option<u32>,
    /// Layers to offload to an accelerator (0 = CPU only).
    pub gpu_layers: Option<u32>,
}

/// Metadata the engine reports after a successful load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineModelInfo {
    /// Context length actually allocated.
    pub context_length: u64,
    /// Whether an accelerator is in use.
    pub gpu: bool,
}

/// State the native engine reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No context is allocated.
    Idle,
    /// A context is allocated and idle.
    Ready,
    /// A context is allocated and generating.
    Busy,
}

impl EngineState {
    /// Whether the engine holds a usable context.
    pub const fn has_context(self) -> bool {
        matches!(self, Self::Ready | Self::Busy)
    }
}

/// Why the engine stopped producing tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStopReason {
    EndOfSequence,
    MaxTokens,
    StopSequence,
    Cancelled,
}

/// Final result of a native completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCompletion {
    /// Full generated text.
    pub text: String,
    /// Number of tokens produced.
    pub tokens: u32,
    pub stop_reason: EngineStopReason,
}

/// Category of a native failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    OutOfMemory,
    Unsupported,
    ContextInvalid,
    Cancelled,
    Busy,
    Other,
}

/// Error reported by the native engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether the native context should be treated as unusable.
    pub fn indicates_invalid_context(&self) -> bool {
        self.kind == EngineErrorKind::ContextInvalid
            || self.message.to_lowercase().contains("context")
    }
}

/// Receives each generated token piece as it is produced.
pub type TokenCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Receives native load progress as a fraction in `0.0..=1.0`.
pub type LoadProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// Port for the native on-device inference binding.
///
/// Implementations hold at most one model context. Callers guarantee that
/// `load` is never invoked while a context exists and that `generate` is
/// never invoked concurrently with itself.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Create a native context for the model at `path`.
    async fn load(
        &self,
        path: &Path,
        params: &EngineLoadParams,
        progress: LoadProgressCallback,
    ) -> Result<EngineModelInfo, EngineError>;

    /// Free the native context, if any.
    async fn release(&self) -> Result<(), EngineError>;

    /// What the engine itself believes its state is.
    fn state(&self) -> EngineState;

    /// Run a completion, streaming token pieces into `on_token`.
    async fn generate(
        &self,
        prompt: &Prompt,
        params: &InferenceConfig,
        on_token: TokenCallback,
    ) -> Result<EngineCompletion, EngineError>;

    /// Ask a running completion to stop. Returns once the request has been
    /// delivered, not once generation has ended.
    async fn cancel(&self) -> Result<(), EngineError>;
}
