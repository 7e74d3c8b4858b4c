//! Model capability flags.
//!
//! Capabilities are part of an artifact's identity: two imports that differ
//! only in what the model can do are different catalog versions.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// What an imported model is able to do.
    ///
    /// Absence means "unknown", not "forbidden".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct ModelCapabilities: u32 {
        /// Chat-style completion over a message list.
        const CHAT       = 0b0000_0001;
        /// Raw text completion.
        const COMPLETION = 0b0000_0010;
        /// Emits thinking/reasoning blocks before the answer.
        const REASONING  = 0b0000_0100;
        /// Understands tool/function call formats.
        const TOOL_CALLS = 0b0000_1000;
        /// Accepts image inputs.
        const VISION     = 0b0001_0000;
    }
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for ModelCapabilities {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ModelCapabilities {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Ok(Self::from_bits_truncate(bits))
    }
}

impl ModelCapabilities {
    /// Check if the model emits reasoning blocks.
    pub const fn supports_reasoning(self) -> bool {
        self.contains(Self::REASONING)
    }

    /// Check if the model supports chat completion.
    pub const fn supports_chat(self) -> bool {
        self.contains(Self::CHAT)
    }

    /// Human-readable tags, in flag order.
    pub fn to_tags(self) -> Vec<&'static str> {
        let mut tags = Vec::new();
        if self.contains(Self::CHAT) {
            tags.push("chat");
        }
        if self.contains(Self::COMPLETION) {
            tags.push("completion");
        }
        if self.contains(Self::REASONING) {
            tags.push("reasoning");
        }
        if self.contains(Self::TOOL_CALLS) {
            tags.push("tools");
        }
        if self.contains(Self::VISION) {
            tags.push("vision");
        }
        tags
    }
}

/// Model name fragments that indicate a reasoning model.
const REASONING_NAME_PATTERNS: &[&str] = &["deepseek-r1", "qwq", "qwen3", "thinking", "reasoning"];

/// Model name fragments that indicate tool-calling support.
const TOOL_NAME_PATTERNS: &[&str] = &["hermes", "functionary", "toolcall", "function"];

/// Model name fragments that indicate an image-capable model.
const VISION_NAME_PATTERNS: &[&str] = &["llava", "vision", "-vl", "moondream"];

/// Infer capabilities from a model or file name.
///
/// Used at import time when the caller did not supply a capability set.
/// Every model is assumed to do chat and plain completion.
pub fn infer_from_name(name: &str) -> ModelCapabilities {
    let lower = name.to_lowercase();
    let mut caps = ModelCapabilities::CHAT | ModelCapabilities::COMPLETION;

    if REASONING_NAME_PATTERNS.iter().any(|p| lower.contains(p)) {
        caps |= ModelCapabilities::REASONING;
    }
    if TOOL_NAME_PATTERNS.iter().any(|p| lower.contains(p)) {
        caps |= ModelCapabilities::TOOL_CALLS;
    }
    if VISION_NAME_PATTERNS.iter().any(|p| lower.contains(p)) {
        caps |= ModelCapabilities::VISION;
    }

    caps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        assert!(ModelCapabilities::default().is_empty());
    }

    #[test]
    fn test_serializes_as_bits() {
        let caps = ModelCapabilities::CHAT | ModelCapabilities::REASONING;
        let json = serde_json::to_string(&caps).unwrap();
        assert_eq!(json, "5");
        let back: ModelCapabilities = serde_json::from_str(&json).unwrap();
        assert_eq!(back, caps);
    }

    #[test]
    fn test_unknown_bits_are_truncated() {
        let caps: ModelCapabilities = serde_json::from_str("1024").unwrap();
        assert!(caps.is_empty());
    }

    #[test]
    fn test_infer_reasoning_from_name() {
        let caps = infer_from_name("DeepSeek-R1-Distill-Qwen-7B.Q4_K_M.gguf");
        assert!(caps.supports_reasoning());
        assert!(caps.supports_chat());
        assert!(!caps.contains(ModelCapabilities::VISION));
    }

    #[test]
    fn test_infer_plain_model() {
        let caps = infer_from_name("Foo-7B.Q4.gguf");
        assert_eq!(caps, ModelCapabilities::CHAT | ModelCapabilities::COMPLETION);
        assert_eq!(caps.to_tags(), vec!["chat", "completion"]);
    }
}
