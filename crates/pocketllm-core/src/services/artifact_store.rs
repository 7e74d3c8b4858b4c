//! Artifact store - the durable catalog of importable model files.
//!
//! The store owns the managed model directory and the bare-filename
//! invariant. Lookups by name or id are served from an in-memory index that
//! is rebuilt from the repository on startup and kept current by import,
//! delete and metadata refresh.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use super::settings_store::SettingsStore;
use super::task_queue::{PostImportTask, TaskQueue};
use crate::domain::{
    ArtifactId, ArtifactStatusView, ContentHash, ImportRequest, ImportSource, ModelArtifact,
    bare_filename, contains_path_separator, infer_from_name,
};
use crate::errors::{ImportError, IntegrityError};
use crate::events::{AppEvent, ModelSummary};
use crate::ports::{AppEventEmitter, ArtifactRepository, ArtifactVersion, CoreError, RepositoryError};

#[derive(Default)]
struct CatalogIndex {
    by_name: HashMap<String, ArtifactId>,
    by_id: HashMap<ArtifactId, ModelArtifact>,
}

impl CatalogIndex {
    fn insert(&mut self, artifact: ModelArtifact) {
        self.by_name.insert(artifact.name.clone(), artifact.id.clone());
        self.by_id.insert(artifact.id.clone(), artifact);
    }

    fn remove(&mut self, id: &ArtifactId) -> Option<ModelArtifact> {
        let artifact = self.by_id.remove(id)?;
        self.by_name.remove(&artifact.name);
        Some(artifact)
    }

    fn owner_of_filename(&self, filename: &str) -> Option<&ModelArtifact> {
        self.by_id.values().find(|a| a.filename == filename)
    }
}

/// Names and filenames claimed by imports that have not finished yet.
#[derive(Default)]
struct PendingImports {
    names: HashSet<String>,
    filenames: HashSet<String>,
}

/// Releases an import's claim when the import returns, however it returns.
struct ImportReservation<'a> {
    pending: &'a Mutex<PendingImports>,
    name: String,
    filename: String,
}

impl Drop for ImportReservation<'_> {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.names.remove(&self.name);
        pending.filenames.remove(&self.filename);
    }
}

/// Service for the model catalog.
pub struct ArtifactStore {
    repo: Arc<dyn ArtifactRepository>,
    settings: SettingsStore,
    emitter: Arc<dyn AppEventEmitter>,
    models_dir: PathBuf,
    index: RwLock<CatalogIndex>,
    pending: Mutex<PendingImports>,
    tasks: Option<TaskQueue>,
}

impl ArtifactStore {
    /// Create a new store. Call [`refresh`](Self::refresh) before use to load
    /// the index.
    pub fn new(
        repo: Arc<dyn ArtifactRepository>,
        settings: SettingsStore,
        emitter: Arc<dyn AppEventEmitter>,
        models_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repo,
            settings,
            emitter,
            models_dir: models_dir.into(),
            index: RwLock::new(CatalogIndex::default()),
            pending: Mutex::new(PendingImports::default()),
            tasks: None,
        }
    }

    /// Deliver a `PostImportTask` for every successful import.
    #[must_use]
    pub fn with_task_queue(mut self, tasks: TaskQueue) -> Self {
        self.tasks = Some(tasks);
        self
    }

    /// The managed model directory.
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    fn read_index(&self) -> RwLockReadGuard<'_, CatalogIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, CatalogIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Import
    // ─────────────────────────────────────────────────────────────────────────

    /// Import a model file into the managed directory and catalog.
    ///
    /// Any directory component of the supplied name is stripped. On error
    /// nothing is left behind: no catalog entry, no settings created by this
    /// call, no copied file.
    pub async fn import(&self, request: ImportRequest) -> Result<ModelArtifact, ImportError> {
        let raw = request.source.raw_filename();
        let filename = bare_filename(&raw).ok_or_else(|| ImportError::InvalidFilename(raw.clone()))?;
        if contains_path_separator(&filename) {
            return Err(ImportError::InvalidFilename(raw));
        }
        if filename != raw {
            debug!(raw = %raw, filename = %filename, "Stripped path from import filename");
        }

        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(|| filename.clone(), str::to_string);

        let _reservation = self.reserve(&name, &filename)?;

        let dest = self.models_dir.join(&filename);
        let size = self.copy_into_place(&request.source, &filename, &dest).await?;

        let (_, settings_created) = match self
            .settings
            .ensure_defaults(&name, request.download_source.clone())
            .await
        {
            Ok(result) => result,
            Err(e) => {
                remove_file_quietly(&dest).await;
                return Err(ImportError::Repository(e.to_string()));
            }
        };

        let artifact = ModelArtifact {
            id: ArtifactId::for_name(&name),
            capabilities: request
                .capabilities
                .unwrap_or_else(|| infer_from_name(&name)),
            name,
            filename,
            architecture: request.architecture,
            quantization: request.quantization,
            context_length: request.context_length,
            creator: request.creator,
            active: true,
            deleted: false,
            size,
            imported_at: Utc::now(),
        };

        let hash = match self.repo.put_version(&artifact).await {
            Ok(hash) => hash,
            Err(e) => {
                remove_file_quietly(&dest).await;
                if settings_created {
                    if let Err(cleanup) = self.settings.remove(&artifact.name).await {
                        warn!(model = %artifact.name, error = %cleanup, "Failed to roll back model settings");
                    }
                }
                return Err(ImportError::Repository(e.to_string()));
            }
        };

        self.write_index().insert(artifact.clone());
        info!(
            artifact_id = %artifact.id.short(),
            version = %hash.short(),
            name = %artifact.name,
            size = artifact.size,
            "Imported model"
        );

        self.emitter
            .emit(AppEvent::model_imported(ModelSummary::from(&artifact)));
        if let Some(ref tasks) = self.tasks {
            tasks.enqueue(PostImportTask::ModelImported {
                artifact_id: artifact.id.clone(),
                model_name: artifact.name.clone(),
                creator: artifact.creator.clone(),
            });
        }

        Ok(artifact)
    }

    /// Claim `name` and `filename` for one import.
    ///
    /// Fails if either is already cataloged or claimed by an import still in
    /// flight. The claim is held until the returned guard drops; a successful
    /// import inserts into the index first, so the name is never unclaimed
    /// in between.
    fn reserve(&self, name: &str, filename: &str) -> Result<ImportReservation<'_>, ImportError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let index = self.read_index();
        if index.by_name.contains_key(name) || pending.names.contains(name) {
            return Err(ImportError::Collision(name.to_string()));
        }
        if index.owner_of_filename(filename).is_some() || pending.filenames.contains(filename) {
            return Err(ImportError::Collision(filename.to_string()));
        }
        drop(index);

        pending.names.insert(name.to_string());
        pending.filenames.insert(filename.to_string());
        Ok(ImportReservation {
            pending: &self.pending,
            name: name.to_string(),
            filename: filename.to_string(),
        })
    }

    /// Write the source bytes to `dest` through a temporary file so a failed
    /// copy never leaves a partial model under the real name.
    async fn copy_into_place(
        &self,
        source: &ImportSource,
        filename: &str,
        dest: &Path,
    ) -> Result<u64, ImportError> {
        let copy_err = |e: std::io::Error| ImportError::Copy {
            path: dest.to_path_buf(),
            message: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.models_dir)
            .await
            .map_err(copy_err)?;

        let partial = self.models_dir.join(format!(".{filename}.part"));
        let written = match source {
            ImportSource::File(path) => tokio::fs::copy(path, &partial).await,
            ImportSource::Bytes { data, .. } => tokio::fs::write(&partial, data)
                .await
                .map(|()| data.len() as u64),
        };
        let size = match written {
            Ok(size) => size,
            Err(e) => {
                remove_file_quietly(&partial).await;
                return Err(copy_err(e));
            }
        };

        if let Err(e) = tokio::fs::rename(&partial, dest).await {
            remove_file_quietly(&partial).await;
            return Err(copy_err(e));
        }
        Ok(size)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// All listed (not deleted) artifacts, sorted by name.
    pub fn list(&self) -> Vec<ModelArtifact> {
        let mut artifacts: Vec<ModelArtifact> = self.read_index().by_id.values().cloned().collect();
        artifacts.sort_by(|a, b| a.name.cmp(&b.name));
        artifacts
    }

    /// Listed artifacts joined with their runtime status.
    pub async fn list_with_status(&self) -> Result<Vec<ArtifactStatusView>, CoreError> {
        let mut views = Vec::new();
        for artifact in self.list() {
            let status = self
                .settings
                .get(&artifact.name)
                .await?
                .map(|s| s.load_status())
                .unwrap_or_default();
            views.push(ArtifactStatusView { artifact, status });
        }
        Ok(views)
    }

    /// Look up a listed artifact by name.
    pub fn get_by_name(&self, name: &str) -> Option<ModelArtifact> {
        let index = self.read_index();
        index
            .by_name
            .get(name)
            .and_then(|id| index.by_id.get(id))
            .cloned()
    }

    /// Look up a listed artifact by id.
    pub fn get_by_id(&self, id: &ArtifactId) -> Option<ModelArtifact> {
        self.read_index().by_id.get(id).cloned()
    }

    /// Find the listed artifact whose managed file is `path`.
    pub fn find_by_path(&self, path: &Path) -> Option<ModelArtifact> {
        let filename = path.file_name()?.to_str()?;
        if path.parent() != Some(self.models_dir.as_path()) {
            return None;
        }
        self.read_index().owner_of_filename(filename).cloned()
    }

    /// Absolute path of an artifact's managed file.
    pub fn path_for(&self, artifact: &ModelArtifact) -> Result<PathBuf, IntegrityError> {
        if contains_path_separator(&artifact.filename) {
            return Err(IntegrityError::CorruptFilename {
                name: artifact.name.clone(),
                filename: artifact.filename.clone(),
            });
        }
        Ok(self.models_dir.join(&artifact.filename))
    }

    /// Every stored version of an artifact, oldest first.
    pub async fn history(&self, id: &ArtifactId) -> Result<Vec<ArtifactVersion>, CoreError> {
        Ok(self.repo.history(id).await?)
    }

    /// Per-model and global settings.
    pub const fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Soft-delete an artifact and remove its file.
    ///
    /// Returns `false` if no listed artifact has that name. Failure to remove
    /// the file is logged and does not prevent the delete.
    pub async fn delete(&self, name: &str) -> Result<bool, CoreError> {
        let Some(mut artifact) = self.get_by_name(name) else {
            return Ok(false);
        };

        artifact.deleted = true;
        artifact.active = false;
        self.repo.put_version(&artifact).await?;

        match self.path_for(&artifact) {
            Ok(path) => match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Removed model file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove model file"),
            },
            Err(e) => warn!(error = %e, "Not removing file for corrupt catalog entry"),
        }

        self.write_index().remove(&artifact.id);
        info!(artifact_id = %artifact.id.short(), name = %artifact.name, "Removed model");
        self.emitter.emit(AppEvent::model_removed(artifact.id));
        Ok(true)
    }

    /// Persist metadata discovered by the runtime (negotiated context length)
    /// as a new version of the artifact.
    ///
    /// Returns the new version hash, or `None` if nothing changed.
    pub async fn update_runtime_metadata(
        &self,
        id: &ArtifactId,
        context_length: u64,
    ) -> Result<Option<ContentHash>, CoreError> {
        let Some(mut artifact) = self.get_by_id(id) else {
            return Err(RepositoryError::NotFound(format!("artifact {id}")).into());
        };
        if artifact.context_length == Some(context_length) {
            return Ok(None);
        }

        artifact.context_length = Some(context_length);
        let hash = self.repo.put_version(&artifact).await?;
        self.write_index().insert(artifact);
        debug!(artifact_id = %id.short(), context_length, version = %hash.short(), "Refreshed artifact metadata");
        self.emitter.emit(AppEvent::models_updated());
        Ok(Some(hash))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Startup
    // ─────────────────────────────────────────────────────────────────────────

    /// Rebuild the in-memory index from the repository.
    ///
    /// Returns the number of listed artifacts.
    pub async fn refresh(&self) -> Result<usize, CoreError> {
        let mut index = CatalogIndex::default();
        for artifact in self.repo.list().await? {
            if artifact.is_listed() {
                index.insert(artifact);
            }
        }
        let count = index.by_id.len();
        *self.write_index() = index;
        debug!(count, "Rebuilt catalog index");
        Ok(count)
    }

    /// Fail fast if any stored artifact, deleted or not, has a filename with
    /// a path separator. Such entries are never normalized silently.
    ///
    /// Returns the number of artifacts checked.
    pub async fn validate_all(&self) -> Result<usize, CoreError> {
        let artifacts = self.repo.list().await?;
        for artifact in &artifacts {
            if contains_path_separator(&artifact.filename) {
                return Err(IntegrityError::CorruptFilename {
                    name: artifact.name.clone(),
                    filename: artifact.filename.clone(),
                }
                .into());
            }
        }
        Ok(artifacts.len())
    }
}

async fn remove_file_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to clean up file");
        }
    }
}
