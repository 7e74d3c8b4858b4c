//! Data root, database and model directory resolution.
//!
//! Resolution order for the data root:
//! 1. `POCKETLLM_DATA_DIR` environment variable
//! 2. System data directory (e.g., `~/.local/share/pocketllm`)
//!
//! The managed model directory is `<data_root>/models` unless
//! `POCKETLLM_MODELS_DIR` is set.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use super::error::PathError;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "POCKETLLM_DATA_DIR";

/// Environment variable overriding the managed model directory.
pub const MODELS_DIR_ENV: &str = "POCKETLLM_MODELS_DIR";

/// Catalog database file name inside the data root.
pub const DATABASE_FILE: &str = "pocketllm.db";

/// Managed model directory name inside the data root.
pub const MODELS_SUBDIR: &str = "models";

/// How the models directory was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelsDirSource {
    /// Passed explicitly by the caller.
    Explicit,
    /// From `POCKETLLM_MODELS_DIR`.
    EnvVar,
    /// `<data_root>/models`.
    Default,
}

/// All resolved paths captured in a single struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub data_root: PathBuf,
    pub database_path: PathBuf,
    pub models_dir: PathBuf,
    pub models_source: ModelsDirSource,
}

impl ResolvedPaths {
    /// Resolve all paths using the current environment.
    pub fn resolve(explicit_models_dir: Option<&Path>) -> Result<Self, PathError> {
        let data_override = non_empty_env(DATA_DIR_ENV);
        let models_override = non_empty_env(MODELS_DIR_ENV);
        Self::from_overrides(
            data_override.as_deref().map(Path::new),
            explicit_models_dir,
            models_override.as_deref().map(Path::new),
        )
    }

    /// Pure resolution from already-read overrides.
    pub fn from_overrides(
        data_override: Option<&Path>,
        explicit_models_dir: Option<&Path>,
        env_models_dir: Option<&Path>,
    ) -> Result<Self, PathError> {
        let data_root = match data_override {
            Some(path) => path.to_path_buf(),
            None => dirs::data_local_dir()
                .ok_or(PathError::NoDataDir)?
                .join("pocketllm"),
        };

        let (models_dir, models_source) = if let Some(path) = explicit_models_dir {
            (path.to_path_buf(), ModelsDirSource::Explicit)
        } else if let Some(path) = env_models_dir {
            (path.to_path_buf(), ModelsDirSource::EnvVar)
        } else {
            (data_root.join(MODELS_SUBDIR), ModelsDirSource::Default)
        };

        Ok(Self {
            database_path: data_root.join(DATABASE_FILE),
            data_root,
            models_dir,
            models_source,
        })
    }
}

impl fmt::Display for ResolvedPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "data root:  {}", self.data_root.display())?;
        writeln!(f, "database:   {}", self.database_path.display())?;
        write!(
            f,
            "models dir: {} ({:?})",
            self.models_dir.display(),
            self.models_source
        )
    }
}

/// Root directory for application data.
pub fn data_root() -> Result<PathBuf, PathError> {
    Ok(ResolvedPaths::resolve(None)?.data_root)
}

/// Path to the catalog database.
pub fn database_path() -> Result<PathBuf, PathError> {
    Ok(ResolvedPaths::resolve(None)?.database_path)
}

/// Path to the managed model directory.
pub fn models_dir() -> Result<PathBuf, PathError> {
    Ok(ResolvedPaths::resolve(None)?.models_dir)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
