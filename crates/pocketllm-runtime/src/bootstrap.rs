//! Composition root.
//!
//! Wires repositories, the native engine and the event bus into the
//! services the rest of the application talks to. Adapters (CLI, app shell)
//! build an [`AppServices`] once and call [`AppServices::start`] before
//! handling any request.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use pocketllm_core::{
    AppEvent, AppEventEmitter, ArtifactStore, InferenceEngine, PostImportHandler, Repos,
    SettingsStore, TaskQueue, ThinkingRecorder,
};

use crate::error::RuntimeError;
use crate::events::EventBus;
use crate::orchestrator::GenerationOrchestrator;
use crate::runtime::InferenceRuntime;

/// What startup recovery found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StartupReport {
    /// Listed artifacts in the rebuilt index.
    pub models: usize,
    /// Stored artifacts whose filenames were validated, deleted ones included.
    pub validated: usize,
    /// Models whose persisted "loaded" flag was stale.
    pub stale_cleared: usize,
}

/// Fully composed services.
pub struct AppServices {
    pub repos: Repos,
    pub store: Arc<ArtifactStore>,
    pub settings: SettingsStore,
    pub runtime: InferenceRuntime,
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub recorder: ThinkingRecorder,
    pub events: EventBus,
    post_import_worker: Option<JoinHandle<()>>,
}

impl AppServices {
    /// Compose services over `repos` and `engine`.
    ///
    /// The runtime policy is read from the stored global settings once, here.
    /// When `post_import` is given, every successful import delivers a task
    /// to it on a background worker; must then be called inside a tokio
    /// runtime.
    pub async fn new(
        repos: Repos,
        engine: Arc<dyn InferenceEngine>,
        models_dir: impl Into<PathBuf>,
        post_import: Option<Arc<dyn PostImportHandler>>,
    ) -> Result<Self, RuntimeError> {
        let events = EventBus::new();
        let emitter: Arc<dyn AppEventEmitter> = Arc::new(events.clone());

        let settings = SettingsStore::new(
            Arc::clone(&repos.model_settings),
            Arc::clone(&repos.settings),
        );
        let policy = settings.global().await?.runtime_policy();

        let (tasks, post_import_worker) = match post_import {
            Some(handler) => {
                let (tasks, worker) = TaskQueue::spawn(handler);
                (Some(tasks), Some(worker))
            }
            None => (None, None),
        };

        let mut store = ArtifactStore::new(
            Arc::clone(&repos.artifacts),
            settings.clone(),
            Arc::clone(&emitter),
            models_dir,
        );
        if let Some(tasks) = tasks {
            store = store.with_task_queue(tasks);
        }
        let store = Arc::new(store);

        let recorder = ThinkingRecorder::new(Arc::clone(&repos.segments));
        let runtime = InferenceRuntime::new(
            engine,
            Arc::clone(&store),
            Arc::clone(&emitter),
            policy,
        );
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            runtime.clone(),
            recorder.clone(),
            emitter,
        ));

        Ok(Self {
            repos,
            store,
            settings,
            runtime,
            orchestrator,
            recorder,
            events,
            post_import_worker,
        })
    }

    /// Startup recovery.
    ///
    /// Rebuilds the catalog index, refuses to start if any stored filename
    /// is corrupt, and clears persisted "loaded" flags left by a previous
    /// process: no native context can exist yet.
    pub async fn start(&self) -> Result<StartupReport, RuntimeError> {
        let validated = self.store.validate_all().await?;
        let models = self.store.refresh().await?;
        let stale_cleared = self.settings.clear_stale_loaded().await?;

        info!(models, validated, stale_cleared, "Startup recovery complete");
        self.events.publish(AppEvent::models_updated());

        Ok(StartupReport {
            models,
            validated,
            stale_cleared,
        })
    }

    /// Release the native context and stop background workers.
    pub async fn shutdown(mut self) {
        self.orchestrator.stop_generation().await;
        self.runtime.unload().await;
        if let Some(worker) = self.post_import_worker.take() {
            worker.abort();
        }
    }
}
