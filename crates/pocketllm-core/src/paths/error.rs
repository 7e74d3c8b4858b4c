//! Errors from resolving and preparing the data directories.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    /// No platform data directory and no `POCKETLLM_DATA_DIR` override.
    #[error("Cannot determine a data directory; set POCKETLLM_DATA_DIR")]
    NoDataDir,

    #[error("{0} exists but is not a directory")]
    NotADirectory(PathBuf),

    /// Missing and the caller did not allow creating it.
    #[error("Directory {0} does not exist")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to create directory {path}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Path cannot be empty")]
    EmptyPath,
}
