//! Path utilities for pocketllm data directories.
//!
//! This module provides the canonical path resolution for:
//! - The data root
//! - The catalog database
//! - The managed model directory
//!
//! # Design
//!
//! - Returns `PathBuf` and `PathError` for clear error handling
//! - No interactive/terminal I/O
//! - Environment lookups are isolated in thin wrappers around pure resolvers

mod ensure;
mod error;
mod resolver;

pub use ensure::{DirectoryCreationStrategy, ensure_directory};
pub use error::PathError;
pub use resolver::{
    DATA_DIR_ENV, DATABASE_FILE, MODELS_DIR_ENV, MODELS_SUBDIR, ModelsDirSource, ResolvedPaths,
    data_root, database_path, models_dir,
};
