//! Thinking segment domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::ArtifactId;
use super::hash::{ContentHash, hash_canonical};

/// What a stored segment contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    /// `<think>`-style chain of thought.
    Thinking,
    /// `<reasoning>`-style or analysis-channel reasoning.
    Reasoning,
    /// The user-facing answer, when stored alongside reasoning.
    Response,
    /// Reasoning that was cut off before its closing delimiter.
    Raw,
}

impl SegmentKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Thinking => "thinking",
            Self::Reasoning => "reasoning",
            Self::Response => "response",
            Self::Raw => "raw",
        }
    }
}

/// An immutable block of model reasoning.
///
/// Addressed by the hash of its canonical serialization; storing the same
/// segment twice is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingSegment {
    pub kind: SegmentKind,
    pub content: String,
    /// Position of this segment within its response.
    pub index: u32,
    pub created_at: DateTime<Utc>,
    /// Model that produced the response.
    pub model_id: Option<ArtifactId>,
    /// Length in bytes of the raw response the segment came from.
    pub response_length: Option<usize>,
}

impl ThinkingSegment {
    /// Content hash of this segment.
    pub fn content_hash(&self) -> Result<ContentHash, serde_json::Error> {
        hash_canonical(self)
    }
}

/// A segment together with the hash it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSegment {
    pub hash: ContentHash,
    pub segment: ThinkingSegment,
}
