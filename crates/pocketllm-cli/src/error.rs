//! CLI error type and exit-code mapping.

use pocketllm_core::{CoreError, ImportError, IntegrityError, PathError, RepositoryError};
use pocketllm_runtime::RuntimeError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Core domain error.
    #[error("{0}")]
    Core(String),

    /// Invalid arguments or unknown model.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// No such model.
    #[error("Model not found: {0}")]
    NotFound(String),

    /// A model file or catalog entry is corrupt.
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl CliError {
    /// Map error to an exit code.
    ///
    /// - 1: General error
    /// - 2: Invalid arguments
    /// - 64-78: see sysexits.h
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Core(_) => 1,
            Self::Arguments(_) => 2,
            Self::NotFound(_) => 66,  // EX_NOINPUT
            Self::Integrity(_) => 65, // EX_DATAERR
            Self::Io(_) => 74,        // EX_IOERR
            Self::Config(_) => 78,    // EX_CONFIG
            Self::Database(_) => 73,  // EX_CANTCREAT (closest fit)
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Repository(RepositoryError::NotFound(what)) => Self::NotFound(what),
            CoreError::Repository(repo_err) => Self::Database(repo_err.to_string()),
            CoreError::Import(import_err) => import_err.into(),
            CoreError::Integrity(integrity_err) => integrity_err.into(),
            CoreError::Settings(settings_err) => Self::Config(settings_err.to_string()),
            CoreError::Validation(msg) => Self::Arguments(msg),
            CoreError::Internal(msg) => Self::Core(msg),
        }
    }
}

impl From<ImportError> for CliError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::InvalidFilename(_) | ImportError::Collision(_) => {
                Self::Arguments(err.to_string())
            }
            ImportError::Copy { .. } => Self::Io(err.to_string()),
            ImportError::Repository(msg) => Self::Database(msg),
        }
    }
}

impl From<IntegrityError> for CliError {
    fn from(err: IntegrityError) -> Self {
        Self::Integrity(err.to_string())
    }
}

impl From<RuntimeError> for CliError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Integrity(e) => e.into(),
            RuntimeError::ModelNotFound(name) => Self::NotFound(name),
            other => Self::Core(other.to_string()),
        }
    }
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Core(format!("Failed to render JSON: {err}"))
    }
}
