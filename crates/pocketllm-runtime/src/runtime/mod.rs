//! The single owner of the native inference context.
//!
//! `InferenceRuntime` drives the [`RuntimeState`] machine over one
//! [`InferenceEngine`]. It guarantees:
//!
//! - at most one native context exists, and a switch releases the old one
//!   before the new one is loaded;
//! - concurrent `initialize` calls for the same path share one native load;
//!   a call for a different path waits for the in-flight load to settle;
//! - a path that fails `max_load_failures` times in a row is refused without
//!   touching the engine until [`InferenceRuntime::reset_error_state`].
//!
//! The runtime is cheap to clone; clones share the same context.

mod session;

pub(crate) use session::GenerationSession;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use pocketllm_core::{
    AppEvent, AppEventEmitter, ArtifactId, ArtifactStore, EngineLoadParams, InferenceEngine,
    IntegrityError, LoadProgressCallback, LoadedModel, ModelArtifact, RuntimePolicy, RuntimeState,
    SettingsStore,
};

use crate::error::RuntimeError;
use crate::integrity::verify_model_file;

type LoadOutcome = Shared<BoxFuture<'static, Result<LoadedModel, RuntimeError>>>;

struct InFlight {
    id: u64,
    path: PathBuf,
    outcome: LoadOutcome,
}

struct Slot {
    state: RuntimeState,
    context: Option<LoadedModel>,
    in_flight: Option<InFlight>,
    next_load_id: u64,
}

enum Pending {
    Join(LoadOutcome),
    Wait(LoadOutcome),
    Start(LoadOutcome),
}

pub(crate) struct RuntimeInner {
    engine: Arc<dyn InferenceEngine>,
    store: Arc<ArtifactStore>,
    settings: SettingsStore,
    emitter: Arc<dyn AppEventEmitter>,
    policy: RuntimePolicy,
    slot: Mutex<Slot>,
    failures: Mutex<HashMap<PathBuf, u32>>,
    /// Held for the duration of every native load, release and generation.
    native: Arc<tokio::sync::Mutex<()>>,
}

/// Owner of the single native inference context.
#[derive(Clone)]
pub struct InferenceRuntime {
    inner: Arc<RuntimeInner>,
}

impl InferenceRuntime {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        store: Arc<ArtifactStore>,
        emitter: Arc<dyn AppEventEmitter>,
        policy: RuntimePolicy,
    ) -> Self {
        let settings = store.settings().clone();
        Self {
            inner: Arc::new(RuntimeInner {
                engine,
                store,
                settings,
                emitter,
                policy,
                slot: Mutex::new(Slot {
                    state: RuntimeState::Uninitialized,
                    context: None,
                    in_flight: None,
                    next_load_id: 0,
                }),
                failures: Mutex::new(HashMap::new()),
                native: Arc::new(tokio::sync::Mutex::new(())),
            }),
        }
    }

    /// Ensure the model at `path` is loaded.
    ///
    /// A no-op when that path is already bound and ready. Any other bound
    /// model is released first.
    pub async fn initialize(
        &self,
        path: &Path,
        params: EngineLoadParams,
    ) -> Result<LoadedModel, RuntimeError> {
        self.initialize_with_progress(path, params, None).await
    }

    /// [`initialize`](Self::initialize), reporting native load progress as a
    /// fraction in `0.0..=1.0`.
    ///
    /// Progress is only reported to the caller that started the native load;
    /// callers that join it get the outcome only. A started load runs to
    /// completion even if the caller is dropped.
    pub async fn initialize_with_progress(
        &self,
        path: &Path,
        params: EngineLoadParams,
        progress: Option<LoadProgressCallback>,
    ) -> Result<LoadedModel, RuntimeError> {
        loop {
            let pending = {
                let mut slot = self.inner.lock_slot();
                if slot.state.has_context() {
                    if let Some(ctx) = slot.context.as_ref().filter(|c| c.path == path) {
                        debug!(path = %path.display(), "Model already loaded");
                        return Ok(ctx.clone());
                    }
                }

                match &slot.in_flight {
                    Some(f) if f.path == path => Pending::Join(f.outcome.clone()),
                    Some(f) => Pending::Wait(f.outcome.clone()),
                    None => {
                        let failures = self.inner.failure_count(path);
                        if failures >= self.inner.policy.max_load_failures {
                            warn!(
                                path = %path.display(),
                                failures,
                                "Refusing load of repeatedly failing model"
                            );
                            return Err(RuntimeError::LoadRefused {
                                path: path.to_path_buf(),
                                failures,
                            });
                        }

                        let id = slot.next_load_id;
                        slot.next_load_id += 1;
                        let outcome = Arc::clone(&self.inner)
                            .run_load(id, path.to_path_buf(), params.clone(), progress.clone())
                            .boxed()
                            .shared();
                        slot.in_flight = Some(InFlight {
                            id,
                            path: path.to_path_buf(),
                            outcome: outcome.clone(),
                        });
                        // Drive the load even if every caller goes away
                        tokio::spawn(outcome.clone().map(|_| ()));
                        Pending::Start(outcome)
                    }
                }
            };

            match pending {
                Pending::Start(outcome) => return outcome.await,
                Pending::Join(outcome) => {
                    debug!(path = %path.display(), "Joining in-flight load");
                    return outcome.await;
                }
                Pending::Wait(outcome) => {
                    debug!(path = %path.display(), "Waiting for in-flight load of another model");
                    // Its outcome is not ours; re-evaluate once it settles
                    let _ = outcome.await;
                }
            }
        }
    }

    /// Bind a different model, releasing the current one first.
    pub async fn switch_to(
        &self,
        path: &Path,
        params: EngineLoadParams,
    ) -> Result<LoadedModel, RuntimeError> {
        if let Some(current) = self.current() {
            if current.path != path {
                info!(
                    from = %current.model_name,
                    to = %path.display(),
                    "Switching model"
                );
            }
        }
        self.initialize(path, params).await
    }

    /// Release the native context.
    ///
    /// A running generation is cancelled first. Returns the model that was
    /// bound, if any.
    pub async fn unload(&self) -> Option<LoadedModel> {
        if self.state() == RuntimeState::Generating {
            if let Err(e) = self.inner.engine.cancel().await {
                warn!(error = %e, "Failed to cancel generation before unload");
            }
        }

        let _native = self.inner.native.lock().await;
        let released = self.inner.release_current().await;
        if released.is_none() {
            let mut slot = self.inner.lock_slot();
            self.inner.transition(&mut slot, RuntimeState::Released);
        }
        released
    }

    /// Whether `artifact_id` is bound and the engine agrees it holds a
    /// context.
    ///
    /// If the engine has lost a context the runtime still records, the stale
    /// record is cleared and `ModelUnloaded` is emitted.
    pub async fn is_loaded(&self, artifact_id: &ArtifactId) -> bool {
        let stale = {
            let slot = self.inner.lock_slot();
            match &slot.context {
                Some(ctx)
                    if ctx.artifact_id.as_ref() == Some(artifact_id)
                        && slot.state.has_context() =>
                {
                    if self.inner.engine.state().has_context() {
                        return true;
                    }
                    ctx.clone()
                }
                _ => return false,
            }
        };

        warn!(
            model = %stale.model_name,
            "Engine reports no context for a loaded model; clearing stale state"
        );
        self.inner.clear_stale(&stale).await;
        false
    }

    /// Clear the failure counter for `path` and leave the `error` state.
    ///
    /// Returns the number of failures that were recorded.
    pub fn reset_error_state(&self, path: &Path) -> u32 {
        let cleared = self
            .inner
            .lock_failures()
            .remove(path)
            .unwrap_or_default();
        let mut slot = self.inner.lock_slot();
        if slot.state == RuntimeState::Error {
            self.inner.transition(&mut slot, RuntimeState::Uninitialized);
        }
        info!(path = %path.display(), cleared, "Reset model error state");
        cleared
    }

    /// Current state of the machine.
    pub fn state(&self) -> RuntimeState {
        self.inner.lock_slot().state
    }

    /// The model bound to the native context, if any.
    pub fn current(&self) -> Option<LoadedModel> {
        let slot = self.inner.lock_slot();
        slot.context.clone().filter(|_| slot.state.has_context())
    }

    /// Whether a native load is in progress.
    pub fn is_loading(&self) -> bool {
        self.inner.lock_slot().in_flight.is_some()
    }

    /// Consecutive failed loads recorded for `path`.
    pub fn failure_count(&self, path: &Path) -> u32 {
        self.inner.failure_count(path)
    }

    pub fn policy(&self) -> &RuntimePolicy {
        &self.inner.policy
    }

    pub(crate) fn store(&self) -> &Arc<ArtifactStore> {
        &self.inner.store
    }

    pub(crate) fn engine(&self) -> &Arc<dyn InferenceEngine> {
        &self.inner.engine
    }

    /// Claim the bound context for one generation.
    ///
    /// Waits for any native operation to finish. Fails with `NotLoaded` if
    /// `path` is not the ready model by then.
    pub(crate) async fn begin_generation(
        &self,
        path: &Path,
    ) -> Result<GenerationSession, RuntimeError> {
        let native = Arc::clone(&self.inner.native).lock_owned().await;
        let model = {
            let mut slot = self.inner.lock_slot();
            let model = match &slot.context {
                Some(ctx) if ctx.path == path && slot.state == RuntimeState::Ready => ctx.clone(),
                _ => return Err(RuntimeError::NotLoaded),
            };
            self.inner
                .try_transition(&mut slot, RuntimeState::Generating)?;
            model
        };
        Ok(GenerationSession::new(Arc::clone(&self.inner), native, model))
    }
}

impl RuntimeInner {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_failures(&self) -> MutexGuard<'_, HashMap<PathBuf, u32>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failure_count(&self, path: &Path) -> u32 {
        self.lock_failures().get(path).copied().unwrap_or_default()
    }

    /// Move to `next`, emitting `RuntimeStateChanged`.
    fn try_transition(&self, slot: &mut Slot, next: RuntimeState) -> Result<(), RuntimeError> {
        let from = slot.state;
        if from == next {
            return Ok(());
        }
        if !from.can_transition_to(next) {
            return Err(RuntimeError::InvalidTransition { from, to: next });
        }
        slot.state = next;
        debug!(%from, to = %next, "Runtime state changed");
        self.emitter.emit(AppEvent::state_changed(from, next));
        Ok(())
    }

    /// Transition the runtime drives itself; an illegal one is a bug and is
    /// logged instead of surfaced.
    fn transition(&self, slot: &mut Slot, next: RuntimeState) {
        if let Err(e) = self.try_transition(slot, next) {
            warn!(error = %e, "Ignoring invalid runtime transition");
        }
    }

    async fn run_load(
        self: Arc<Self>,
        id: u64,
        path: PathBuf,
        params: EngineLoadParams,
        progress: Option<LoadProgressCallback>,
    ) -> Result<LoadedModel, RuntimeError> {
        let result = {
            let _native = self.native.lock().await;
            self.load_locked(&path, params, progress).await
        };

        let mut slot = self.lock_slot();
        if slot.in_flight.as_ref().is_some_and(|f| f.id == id) {
            slot.in_flight = None;
        }
        result
    }

    async fn load_locked(
        &self,
        path: &Path,
        mut params: EngineLoadParams,
        progress: Option<LoadProgressCallback>,
    ) -> Result<LoadedModel, RuntimeError> {
        let artifact = self.store.find_by_path(path);
        let model_name = artifact
            .as_ref()
            .map_or_else(|| display_name(path), |a| a.name.clone());

        // Verify before release: a bad file leaves the current model bound
        if let Err(e) = verify_model_file(path, self.policy.min_model_size_bytes).await {
            self.remove_corrupt_file(&e).await;
            if self.lock_slot().context.is_none() {
                self.begin_loading()?;
            }
            return Err(self
                .fail_load(path, &model_name, artifact.as_ref(), e.into())
                .await);
        }

        // Release-before-acquire
        self.release_current().await;
        self.begin_loading()?;

        self.fill_load_params(&mut params, &model_name, artifact.as_ref())
            .await;
        let progress: LoadProgressCallback = match progress {
            Some(cb) => Arc::new(move |fraction: f32| cb(fraction.clamp(0.0, 1.0))),
            None => Arc::new(|_: f32| {}),
        };

        info!(
            model = %model_name,
            path = %path.display(),
            context_length = ?params.context_length,
            "Loading model"
        );

        let info = match self.engine.load(path, &params, progress).await {
            Ok(info) => info,
            Err(e) => {
                let err = RuntimeError::Load {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                };
                return Err(self
                    .fail_load(path, &model_name, artifact.as_ref(), err)
                    .await);
            }
        };

        self.lock_failures().remove(path);
        let loaded = LoadedModel {
            artifact_id: artifact.as_ref().map(|a| a.id.clone()),
            model_name,
            path: path.to_path_buf(),
            context_length: info.context_length,
            gpu: info.gpu,
        };

        {
            let mut slot = self.lock_slot();
            slot.context = Some(loaded.clone());
            self.try_transition(&mut slot, RuntimeState::Ready)?;
        }

        if let Some(artifact) = &artifact {
            if let Err(e) = self
                .settings
                .mark_loaded(&artifact.name, true, Some(info.context_length))
                .await
            {
                warn!(error = %e, "Failed to persist loaded state");
            }
            if let Err(e) = self
                .store
                .update_runtime_metadata(&artifact.id, info.context_length)
                .await
            {
                warn!(error = %e, "Failed to persist negotiated model metadata");
            }
        }

        info!(
            model = %loaded.model_name,
            context_length = info.context_length,
            gpu = info.gpu,
            "Model loaded"
        );
        self.emitter.emit(AppEvent::model_loaded(
            event_id(&loaded),
            loaded.model_name.clone(),
        ));
        Ok(loaded)
    }

    /// Context length and threads: explicit params, then the model's stored
    /// settings, then the artifact, then policy.
    async fn fill_load_params(
        &self,
        params: &mut EngineLoadParams,
        model_name: &str,
        artifact: Option<&ModelArtifact>,
    ) {
        let stored = match self.settings.get(model_name).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read model settings; using defaults");
                None
            }
        };
        if params.context_length.is_none() {
            params.context_length = Some(
                stored
                    .as_ref()
                    .and_then(|s| s.context_length)
                    .or_else(|| artifact.and_then(|a| a.context_length))
                    .unwrap_or(self.policy.default_context_size),
            );
        }
        if params.threads.is_none() {
            params.threads = stored.and_then(|s| s.threads);
        }
    }

    fn begin_loading(&self) -> Result<(), RuntimeError> {
        let mut slot = self.lock_slot();
        if slot.state == RuntimeState::Error {
            info!("Resetting runtime after failed load");
            self.transition(&mut slot, RuntimeState::Uninitialized);
        }
        self.try_transition(&mut slot, RuntimeState::Loading)
    }

    /// Count a failed load and record it against the model.
    ///
    /// A model that is still bound stays bound and the state is left alone.
    async fn fail_load(
        &self,
        path: &Path,
        model_name: &str,
        artifact: Option<&ModelArtifact>,
        err: RuntimeError,
    ) -> RuntimeError {
        let failures = {
            let mut failures = self.lock_failures();
            let count = failures.entry(path.to_path_buf()).or_default();
            *count += 1;
            *count
        };
        warn!(
            model = %model_name,
            path = %path.display(),
            failures,
            error = %err,
            "Model load failed"
        );

        {
            let mut slot = self.lock_slot();
            if slot.context.is_none() {
                self.transition(&mut slot, RuntimeState::Error);
            }
        }

        if artifact.is_some() {
            if let Err(e) = self.settings.record_error(model_name, &err.to_string()).await {
                warn!(error = %e, "Failed to persist load error");
            }
        }
        err
    }

    async fn remove_corrupt_file(&self, err: &IntegrityError) {
        if !self.policy.remove_corrupt_files || matches!(err, IntegrityError::Missing(_)) {
            return;
        }
        let Some(path) = err.path() else {
            return;
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => info!(path = %path.display(), "Removed corrupt model file"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove corrupt model file"),
        }
    }

    /// Release the bound context. The caller holds the native lock.
    async fn release_current(&self) -> Option<LoadedModel> {
        let previous = self.lock_slot().context.take()?;

        if let Err(e) = self.engine.release().await {
            warn!(error = %e, model = %previous.model_name, "Native release reported an error");
        }
        {
            let mut slot = self.lock_slot();
            self.transition(&mut slot, RuntimeState::Released);
        }
        self.after_unload(&previous).await;
        Some(previous)
    }

    /// Drop a context the engine no longer has.
    async fn clear_stale(&self, stale: &LoadedModel) {
        {
            let mut slot = self.lock_slot();
            if slot.context.as_ref().map(|c| &c.path) != Some(&stale.path) {
                return;
            }
            slot.context = None;
            self.transition(&mut slot, RuntimeState::Released);
        }
        self.after_unload(stale).await;
    }

    async fn after_unload(&self, model: &LoadedModel) {
        if model.artifact_id.is_some() {
            if let Err(e) = self
                .settings
                .mark_loaded(&model.model_name, false, None)
                .await
            {
                warn!(error = %e, "Failed to persist unloaded state");
            }
        }
        info!(model = %model.model_name, "Model unloaded");
        self.emitter.emit(AppEvent::model_unloaded(
            event_id(model),
            model.model_name.clone(),
        ));
    }
}

/// Id used in events; models loaded from outside the catalog get the id
/// their name would have.
fn event_id(model: &LoadedModel) -> ArtifactId {
    model
        .artifact_id
        .clone()
        .unwrap_or_else(|| ArtifactId::for_name(&model.model_name))
}

fn display_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
}
