//! Import and integrity error types.
//!
//! These are the catalog-level members of the error taxonomy. Runtime and
//! generation errors live with the runtime crate.

use std::path::PathBuf;
use thiserror::Error;

/// An import was rejected. Nothing is persisted when this is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImportError {
    /// The supplied name has no usable bare file name.
    #[error("Invalid model filename: {0:?}")]
    InvalidFilename(String),

    /// Copying the model bytes into the managed directory failed.
    #[error("Failed to copy model file to {path}: {message}")]
    Copy { path: PathBuf, message: String },

    /// The destination file already belongs to another catalog entry.
    #[error("A model file named {0} is already imported")]
    Collision(String),

    /// The catalog could not be written.
    #[error("Failed to persist imported model: {0}")]
    Repository(String),
}

/// A model file or catalog entry failed an integrity check.
///
/// The caller must re-import; the same bytes are never retried silently.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("Model file missing: {0}")]
    Missing(PathBuf),

    #[error("Model file {path} is {size} bytes, below the {min_size} byte minimum")]
    Undersized {
        path: PathBuf,
        size: u64,
        min_size: u64,
    },

    #[error("Model file {path} has invalid magic bytes {actual:?}")]
    BadMagic { path: PathBuf, actual: [u8; 4] },

    #[error("Cannot read model file {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    /// A stored artifact's filename contains a path separator. This is
    /// catalog corruption and needs manual repair.
    #[error("Catalog entry '{name}' has a filename with a path separator: {filename:?}")]
    CorruptFilename { name: String, filename: String },
}

impl IntegrityError {
    /// Path of the offending file, when the error concerns one.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Missing(path)
            | Self::Undersized { path, .. }
            | Self::BadMagic { path, .. }
            | Self::Unreadable { path, .. } => Some(path),
            Self::CorruptFilename { .. } => None,
        }
    }
}
