//! Preparing the data root and the managed models directory.

use std::fs;
use std::path::Path;

use super::error::PathError;

/// What to do when a directory is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectoryCreationStrategy {
    #[default]
    AutoCreate,
    /// Fail with `DirectoryNotFound`.
    Disallow,
}

/// Make sure `path` is an existing directory.
pub fn ensure_directory(path: &Path, strategy: DirectoryCreationStrategy) -> Result<(), PathError> {
    if path.as_os_str().is_empty() {
        return Err(PathError::EmptyPath);
    }
    if path.exists() {
        if !path.is_dir() {
            return Err(PathError::NotADirectory(path.to_path_buf()));
        }
        return Ok(());
    }
    match strategy {
        DirectoryCreationStrategy::AutoCreate => {
            fs::create_dir_all(path).map_err(|source| PathError::CreateFailed {
                path: path.to_path_buf(),
                source,
            })
        }
        DirectoryCreationStrategy::Disallow => {
            Err(PathError::DirectoryNotFound(path.to_path_buf()))
        }
    }
}
