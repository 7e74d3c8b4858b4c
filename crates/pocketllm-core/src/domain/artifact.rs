//! Model artifact domain types.
//!
//! A `ModelArtifact` is the persisted catalog record for one importable
//! model file. It carries identity-defining fields only. Transient runtime
//! state (loaded flag, load progress) lives in `ModelSettings` and
//! `LoadStatus`, never here, so an artifact's hashes cannot drift while a
//! model is loaded or unloaded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::capabilities::ModelCapabilities;
use super::hash::{ContentHash, hash_bytes, hash_canonical};

/// Type tag mixed into every artifact hash.
const ARTIFACT_KIND: &str = "ModelArtifact";

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Stable identity of an artifact across all of its versions.
///
/// Derived from the artifact name only, so metadata refreshes append
/// versions under the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Compute the id for an artifact name.
    pub fn for_name(name: &str) -> Self {
        Self(hash_bytes(format!("{ARTIFACT_KIND}:{name}").as_bytes()).to_string())
    }

    /// Wrap an id read back from storage.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque owner identity token supplied by the identity subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Artifact
// ─────────────────────────────────────────────────────────────────────────────

/// A model file registered in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelArtifact {
    /// Stable id (hash of the name).
    pub id: ArtifactId,
    /// Human-readable name, unique in the catalog.
    pub name: String,
    /// Bare file name inside the managed model directory. Never contains a
    /// path separator.
    pub filename: String,
    /// Model architecture (e.g. "llama", "qwen2").
    pub architecture: Option<String>,
    /// Quantization type (e.g. "`Q4_K_M`").
    pub quantization: Option<String>,
    /// Context length; refreshed with the negotiated value after first load.
    pub context_length: Option<u64>,
    /// What the model can do.
    #[serde(default)]
    pub capabilities: ModelCapabilities,
    /// Owner identity of whoever imported the model.
    pub creator: OwnerId,
    /// Whether the artifact is selectable.
    pub active: bool,
    /// Soft-delete marker.
    pub deleted: bool,
    /// File size in bytes.
    pub size: u64,
    /// When the artifact was first imported.
    pub imported_at: DateTime<Utc>,
}

/// The identity-defining subset of an artifact.
///
/// This is the only thing the version hash is computed over. It borrows
/// from a `ModelArtifact` and has no room for runtime state.
#[derive(Debug, Serialize)]
pub struct ArtifactIdentity<'a> {
    kind: &'static str,
    pub name: &'a str,
    pub filename: &'a str,
    pub architecture: Option<&'a str>,
    pub quantization: Option<&'a str>,
    pub context_length: Option<u64>,
    pub capabilities: ModelCapabilities,
    pub creator: &'a OwnerId,
    pub active: bool,
    pub deleted: bool,
    pub size: u64,
}

impl ArtifactIdentity<'_> {
    /// Hash of the canonical serialization of this view.
    pub fn content_hash(&self) -> Result<ContentHash, serde_json::Error> {
        hash_canonical(self)
    }
}

impl ModelArtifact {
    /// Borrow the identity-defining fields.
    pub fn identity(&self) -> ArtifactIdentity<'_> {
        ArtifactIdentity {
            kind: ARTIFACT_KIND,
            name: &self.name,
            filename: &self.filename,
            architecture: self.architecture.as_deref(),
            quantization: self.quantization.as_deref(),
            context_length: self.context_length,
            capabilities: self.capabilities,
            creator: &self.creator,
            active: self.active,
            deleted: self.deleted,
            size: self.size,
        }
    }

    /// Hash identifying this particular version of the artifact.
    pub fn version_hash(&self) -> Result<ContentHash, serde_json::Error> {
        self.identity().content_hash()
    }

    /// Whether the artifact should appear in listings.
    pub const fn is_listed(&self) -> bool {
        !self.deleted
    }
}

/// Transient load status shown next to an artifact.
///
/// Kept apart from `ModelArtifact` so identity never depends on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStatus {
    pub is_loaded: bool,
    pub load_progress: u8,
}

/// An artifact paired with its current load status, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactStatusView {
    pub artifact: ModelArtifact,
    pub status: LoadStatus,
}

// ─────────────────────────────────────────────────────────────────────────────
// Import
// ─────────────────────────────────────────────────────────────────────────────

/// Where the bytes of an import come from.
#[derive(Debug, Clone)]
pub enum ImportSource {
    /// Copy an existing file. The file name is taken from the last path
    /// component.
    File(PathBuf),
    /// Write an in-memory buffer under the given (possibly dirty) name.
    Bytes { filename: String, data: Vec<u8> },
}

impl ImportSource {
    /// The raw, unsanitized name supplied with the source.
    pub fn raw_filename(&self) -> String {
        match self {
            Self::File(path) => path.to_string_lossy().into_owned(),
            Self::Bytes { filename, .. } => filename.clone(),
        }
    }
}

/// Everything needed to import a model.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub source: ImportSource,
    /// Display name; defaults to the bare file name.
    pub name: Option<String>,
    pub architecture: Option<String>,
    pub quantization: Option<String>,
    pub context_length: Option<u64>,
    /// Capability set; inferred from the name when absent.
    pub capabilities: Option<ModelCapabilities>,
    pub creator: OwnerId,
    /// Where the file was originally downloaded from.
    pub download_source: Option<String>,
}

impl ImportRequest {
    /// Create an import request with only the required fields.
    pub fn new(source: ImportSource, creator: OwnerId) -> Self {
        Self {
            source,
            name: None,
            architecture: None,
            quantization: None,
            context_length: None,
            capabilities: None,
            creator,
            download_source: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Filename invariants
// ─────────────────────────────────────────────────────────────────────────────

/// True if `name` contains a path separator of any platform.
pub fn contains_path_separator(name: &str) -> bool {
    name.contains('/') || name.contains('\\')
}

/// Reduce a user-supplied name to its last path component.
///
/// Returns `None` when nothing usable remains (empty, `.` or `..`).
pub fn bare_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(|c| c == '/' || c == '\\').next().unwrap_or_default().trim();
    if last.is_empty() || last == "." || last == ".." || contains_path_separator(last) {
        return None;
    }
    Some(last.to_string())
}
