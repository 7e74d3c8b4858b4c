//! CLI bootstrap - the composition root.
//!
//! The CLI manages the catalog only; it never creates a native context, so
//! it wires the catalog and settings services over `SQLite` and skips the
//! inference runtime.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use pocketllm_core::{
    AppEventEmitter, ArtifactStore, DirectoryCreationStrategy, NoopEmitter, ResolvedPaths,
    RuntimePolicy, SettingsStore, ensure_directory,
};
use pocketllm_db::{CoreFactory, setup_database};

/// Fully composed context for CLI commands.
pub struct CliContext {
    pub paths: ResolvedPaths,
    pub store: Arc<ArtifactStore>,
    pub settings: SettingsStore,
}

impl CliContext {
    /// Runtime policy from the stored global settings.
    pub async fn policy(&self) -> Result<RuntimePolicy, pocketllm_core::CoreError> {
        Ok(self.settings.global().await?.runtime_policy())
    }
}

/// Bootstrap the CLI context.
///
/// Resolves paths (explicit `models_dir`, then environment, then the data
/// root), opens the catalog database and loads the catalog index.
pub async fn bootstrap(models_dir: Option<&Path>) -> Result<CliContext> {
    let paths = ResolvedPaths::resolve(models_dir)?;
    ensure_directory(&paths.data_root, DirectoryCreationStrategy::AutoCreate)?;
    ensure_directory(&paths.models_dir, DirectoryCreationStrategy::AutoCreate)?;

    let pool = setup_database(&paths.database_path)
        .await
        .with_context(|| format!("opening {}", paths.database_path.display()))?;
    let repos = CoreFactory::build_repos(pool);

    let settings = SettingsStore::new(repos.model_settings, repos.settings);
    // No frontend to broadcast to
    let emitter: Arc<dyn AppEventEmitter> = Arc::new(NoopEmitter::new());
    let store = Arc::new(ArtifactStore::new(
        repos.artifacts,
        settings.clone(),
        emitter,
        paths.models_dir.clone(),
    ));
    store.refresh().await?;

    Ok(CliContext {
        paths,
        store,
        settings,
    })
}
