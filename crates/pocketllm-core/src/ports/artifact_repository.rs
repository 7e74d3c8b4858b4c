//! Artifact repository trait definition.
//!
//! The catalog is a versioned, content-addressed store: every write appends
//! a version keyed by the artifact's version hash and moves the head
//! pointer of its stable id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RepositoryError;
use crate::domain::{ArtifactId, ContentHash, ModelArtifact};

/// One historical version of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactVersion {
    /// Version hash (hash of the identity view).
    pub hash: ContentHash,
    /// 1-based position in the artifact's history.
    pub seq: u32,
    pub artifact: ModelArtifact,
    pub recorded_at: DateTime<Utc>,
}

/// Repository for the versioned artifact catalog.
///
/// # Design Rules
///
/// - No `sqlx` types in signatures
/// - Head lookups by stable id; name lookups are served by the in-memory
///   index in `ArtifactStore`
/// - Soft-deleted artifacts stay in the store and are returned by `list`
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Head version of every artifact, deleted ones included.
    async fn list(&self) -> Result<Vec<ModelArtifact>, RepositoryError>;

    /// Head version of one artifact.
    ///
    /// Returns `Err(RepositoryError::NotFound)` if the id is unknown.
    async fn get(&self, id: &ArtifactId) -> Result<ModelArtifact, RepositoryError>;

    /// Append a version and make it the head.
    ///
    /// Writing a version identical to the current head is a no-op that
    /// returns the existing hash.
    async fn put_version(&self, artifact: &ModelArtifact) -> Result<ContentHash, RepositoryError>;

    /// All versions of an artifact, oldest first.
    async fn history(&self, id: &ArtifactId) -> Result<Vec<ArtifactVersion>, RepositoryError>;
}
