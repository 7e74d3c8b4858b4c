//! Generation request/result value types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::artifact::ArtifactId;
use super::inference::InferenceConfig;
use super::thinking::StoredSegment;

/// Role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single chat message handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// What the engine is asked to continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Prompt {
    /// Raw text completion.
    Text(String),
    /// Chat completion over a message list.
    Chat(Vec<ChatMessage>),
}

/// Opaque id of one generation request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Callback receiving progress percentages (0-100) for one request.
pub type ProgressSink = Arc<dyn Fn(u8) + Send + Sync>;

/// A single generation request.
#[derive(Clone)]
pub struct GenerationRequest {
    pub request_id: RequestId,
    /// Target model.
    pub artifact_id: ArtifactId,
    pub prompt: Prompt,
    /// Request-level parameter overrides.
    pub options: InferenceConfig,
    /// Topic the progress events are published under; defaults to the
    /// request id.
    pub topic: Option<String>,
    /// Optional per-request progress callback.
    pub progress: Option<ProgressSink>,
}

impl GenerationRequest {
    pub fn new(artifact_id: ArtifactId, prompt: Prompt, options: InferenceConfig) -> Self {
        Self {
            request_id: RequestId::new(),
            artifact_id,
            prompt,
            options,
            topic: None,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Topic used for progress events.
    pub fn progress_topic(&self) -> String {
        self.topic
            .clone()
            .unwrap_or_else(|| self.request_id.to_string())
    }
}

impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("request_id", &self.request_id)
            .field("artifact_id", &self.artifact_id)
            .field("prompt", &self.prompt)
            .field("options", &self.options)
            .field("topic", &self.topic)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Why a generation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The engine finished on its own (EOS, stop sequence or max tokens).
    Completed,
    /// No token arrived within the idle timeout.
    IdleTimeout,
    /// The caller requested a stop.
    Cancelled,
}

/// Outcome of a successful (possibly partial) generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub request_id: RequestId,
    /// Raw text as produced by the engine.
    pub text: String,
    /// Text with reasoning blocks removed.
    pub visible_text: String,
    /// Reasoning segments extracted from `text`.
    pub segments: Vec<StoredSegment>,
    /// Number of streamed tokens.
    pub token_count: u32,
    /// True when the result was finalized early (idle timeout or stop).
    pub stopped_at_limit: bool,
    pub finish_reason: FinishReason,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_topic_defaults_to_request_id() {
        let request = GenerationRequest::new(
            ArtifactId::for_name("m"),
            Prompt::Text("hi".into()),
            InferenceConfig::default(),
        );
        assert_eq!(request.progress_topic(), request.request_id.to_string());

        let request = request.with_topic("topic-1");
        assert_eq!(request.progress_topic(), "topic-1");
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_prompt_serialization() {
        let prompt = Prompt::Chat(vec![ChatMessage::user("hello")]);
        let json = serde_json::to_string(&prompt).unwrap();
        assert!(json.contains("\"kind\":\"chat\""));
        assert!(json.contains("\"role\":\"user\""));
    }
}
