//! Thinking segment repository trait definition.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{ArtifactId, ContentHash, StoredSegment, ThinkingSegment};

/// Content-addressed store for immutable thinking segments.
#[async_trait]
pub trait SegmentRepository: Send + Sync {
    /// Store a segment under its content hash. Idempotent.
    async fn put(&self, segment: &ThinkingSegment) -> Result<ContentHash, RepositoryError>;

    /// Store every segment of one response, or none of them.
    ///
    /// Hashes are returned in input order.
    async fn put_all(
        &self,
        segments: &[ThinkingSegment],
    ) -> Result<Vec<ContentHash>, RepositoryError>;

    /// Look a segment up by hash.
    ///
    /// Returns `Err(RepositoryError::NotFound)` if no such segment exists.
    async fn get(&self, hash: &ContentHash) -> Result<ThinkingSegment, RepositoryError>;

    /// Segments produced by a model, newest response first and in segment
    /// order within a response.
    async fn list_for_model(&self, model_id: &ArtifactId)
    -> Result<Vec<StoredSegment>, RepositoryError>;
}
