use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{ArtifactId, ContentHash, ModelArtifact, ModelSettings, StoredSegment, ThinkingSegment};
use crate::ports::{
    ArtifactRepository, ArtifactVersion, ModelSettingsRepository, Repos, RepositoryError,
    SegmentRepository, SettingsRepository,
};
use crate::settings::Settings;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn serialization(err: &serde_json::Error) -> RepositoryError {
    RepositoryError::Serialization(err.to_string())
}

/// Versioned artifact catalog held in memory.
#[derive(Default)]
pub struct InMemoryArtifactRepository {
    versions: Mutex<HashMap<ArtifactId, Vec<ArtifactVersion>>>,
    fail_writes: AtomicBool,
}

impl InMemoryArtifactRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put_version` fail with a storage error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Insert a head version verbatim, bypassing any service checks.
    pub fn seed(&self, artifact: ModelArtifact) -> Result<(), RepositoryError> {
        let hash = artifact.version_hash().map_err(|e| serialization(&e))?;
        let mut versions = lock(&self.versions);
        let history = versions.entry(artifact.id.clone()).or_default();
        let seq = u32::try_from(history.len() + 1).unwrap_or(u32::MAX);
        history.push(ArtifactVersion {
            hash,
            seq,
            artifact,
            recorded_at: Utc::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl ArtifactRepository for InMemoryArtifactRepository {
    async fn list(&self) -> Result<Vec<ModelArtifact>, RepositoryError> {
        let versions = lock(&self.versions);
        let mut heads: Vec<ModelArtifact> = versions
            .values()
            .filter_map(|history| history.last().map(|v| v.artifact.clone()))
            .collect();
        heads.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(heads)
    }

    async fn get(&self, id: &ArtifactId) -> Result<ModelArtifact, RepositoryError> {
        lock(&self.versions)
            .get(id)
            .and_then(|history| history.last())
            .map(|v| v.artifact.clone())
            .ok_or_else(|| RepositoryError::NotFound(format!("artifact {id}")))
    }

    async fn put_version(&self, artifact: &ModelArtifact) -> Result<ContentHash, RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("simulated write failure".to_string()));
        }
        let hash = artifact.version_hash().map_err(|e| serialization(&e))?;
        let mut versions = lock(&self.versions);
        let history = versions.entry(artifact.id.clone()).or_default();
        if history.last().is_some_and(|head| head.hash == hash) {
            return Ok(hash);
        }
        let seq = u32::try_from(history.len() + 1).unwrap_or(u32::MAX);
        history.push(ArtifactVersion {
            hash: hash.clone(),
            seq,
            artifact: artifact.clone(),
            recorded_at: Utc::now(),
        });
        Ok(hash)
    }

    async fn history(&self, id: &ArtifactId) -> Result<Vec<ArtifactVersion>, RepositoryError> {
        Ok(lock(&self.versions).get(id).cloned().unwrap_or_default())
    }
}

/// Per-model settings held in memory.
#[derive(Default)]
pub struct InMemoryModelSettingsRepository {
    entries: Mutex<HashMap<String, ModelSettings>>,
    fail_writes: AtomicBool,
}

impl InMemoryModelSettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail with a storage error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ModelSettingsRepository for InMemoryModelSettingsRepository {
    async fn get(&self, model_name: &str) -> Result<Option<ModelSettings>, RepositoryError> {
        Ok(lock(&self.entries).get(model_name).cloned())
    }

    async fn save(&self, settings: &ModelSettings) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("simulated write failure".to_string()));
        }
        lock(&self.entries).insert(settings.model_name.clone(), settings.clone());
        Ok(())
    }

    async fn delete(&self, model_name: &str) -> Result<(), RepositoryError> {
        lock(&self.entries).remove(model_name);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ModelSettings>, RepositoryError> {
        let mut all: Vec<ModelSettings> = lock(&self.entries).values().cloned().collect();
        all.sort_by(|a, b| a.model_name.cmp(&b.model_name));
        Ok(all)
    }
}

/// Content-addressed segment store held in memory.
#[derive(Default)]
pub struct InMemorySegmentRepository {
    segments: Mutex<HashMap<ContentHash, ThinkingSegment>>,
    fail_writes: AtomicBool,
}

impl InMemorySegmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a storage error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of distinct stored segments.
    pub fn len(&self) -> usize {
        lock(&self.segments).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SegmentRepository for InMemorySegmentRepository {
    async fn put(&self, segment: &ThinkingSegment) -> Result<ContentHash, RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("simulated write failure".to_string()));
        }
        let hash = segment.content_hash().map_err(|e| serialization(&e))?;
        lock(&self.segments)
            .entry(hash.clone())
            .or_insert_with(|| segment.clone());
        Ok(hash)
    }

    async fn put_all(
        &self,
        segments: &[ThinkingSegment],
    ) -> Result<Vec<ContentHash>, RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("simulated write failure".to_string()));
        }
        let hashed = segments
            .iter()
            .map(|s| s.content_hash().map(|h| (h, s.clone())))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| serialization(&e))?;
        let mut stored = lock(&self.segments);
        Ok(hashed
            .into_iter()
            .map(|(hash, segment)| {
                stored.entry(hash.clone()).or_insert(segment);
                hash
            })
            .collect())
    }

    async fn get(&self, hash: &ContentHash) -> Result<ThinkingSegment, RepositoryError> {
        lock(&self.segments)
            .get(hash)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("segment {hash}")))
    }

    async fn list_for_model(
        &self,
        model_id: &ArtifactId,
    ) -> Result<Vec<StoredSegment>, RepositoryError> {
        let mut found: Vec<StoredSegment> = lock(&self.segments)
            .iter()
            .filter(|(_, s)| s.model_id.as_ref() == Some(model_id))
            .map(|(hash, segment)| StoredSegment {
                hash: hash.clone(),
                segment: segment.clone(),
            })
            .collect();
        found.sort_by_key(|s| (Reverse(s.segment.created_at), s.segment.index));
        Ok(found)
    }
}

/// Global settings held in memory.
#[derive(Default)]
pub struct InMemorySettingsRepository {
    settings: Mutex<Option<Settings>>,
}

impl InMemorySettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given settings already stored.
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(Some(settings)),
        }
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn load(&self) -> Result<Settings, RepositoryError> {
        Ok(lock(&self.settings)
            .clone()
            .unwrap_or_else(Settings::with_defaults))
    }

    async fn save(&self, settings: &Settings) -> Result<(), RepositoryError> {
        *lock(&self.settings) = Some(settings.clone());
        Ok(())
    }
}

/// Build a `Repos` container backed entirely by memory.
pub fn in_memory_repos() -> Repos {
    Repos::new(
        Arc::new(InMemoryArtifactRepository::new()),
        Arc::new(InMemoryModelSettingsRepository::new()),
        Arc::new(InMemorySegmentRepository::new()),
        Arc::new(InMemorySettingsRepository::new()),
    )
}
