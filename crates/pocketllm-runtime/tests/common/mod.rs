//! Shared fixtures: a scripted native engine and a fully wired harness.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use pocketllm_core::{
    EngineCompletion, EngineError, EngineErrorKind, EngineLoadParams, EngineModelInfo,
    EngineState, EngineStopReason, ImportRequest, ImportSource, InferenceConfig, InferenceEngine,
    LoadProgressCallback, ModelArtifact, OwnerId, Prompt, Repos, Settings, TokenCallback,
    testing::{
        InMemoryArtifactRepository, InMemoryModelSettingsRepository, InMemorySegmentRepository,
        InMemorySettingsRepository,
    },
};
use pocketllm_runtime::{AppServices, GGUF_MAGIC};

/// Size of the model files written by [`Harness::import`].
pub const MODEL_FILE_SIZE: usize = 256;

/// What the fake engine does on its next calls.
#[derive(Clone, Default)]
pub struct Script {
    pub load_delay: Duration,
    /// Number of upcoming loads that fail.
    pub load_failures: u32,
    pub tokens: Vec<String>,
    pub token_delay: Duration,
    /// Stop emitting after this many tokens and wait.
    pub stall_after: Option<usize>,
    /// Whether a stalled generation returns when cancelled.
    pub ack_cancel: bool,
    /// Fail the next generation with this error.
    pub generate_error: Option<EngineError>,
}

impl Script {
    pub fn tokens(pieces: &[&str]) -> Self {
        Self {
            tokens: pieces.iter().map(ToString::to_string).collect(),
            ack_cancel: true,
            ..Self::default()
        }
    }
}

/// Scripted stand-in for the native binding.
///
/// Records how often it was asked to load and whether two contexts (or two
/// loads) ever overlapped.
#[derive(Default)]
pub struct FakeEngine {
    script: Mutex<Script>,
    cancel: Mutex<CancellationToken>,
    loaded: Mutex<Option<PathBuf>>,
    generating: AtomicBool,
    loading: AtomicBool,
    overlapping_loads: AtomicBool,
    loads: AtomicUsize,
    releases: AtomicUsize,
    live_contexts: AtomicUsize,
    max_live_contexts: AtomicUsize,
    lost_context: AtomicBool,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn live_contexts(&self) -> usize {
        self.live_contexts.load(Ordering::SeqCst)
    }

    pub fn max_live_contexts(&self) -> usize {
        self.max_live_contexts.load(Ordering::SeqCst)
    }

    pub fn saw_overlapping_loads(&self) -> bool {
        self.overlapping_loads.load(Ordering::SeqCst)
    }

    pub fn loaded_path(&self) -> Option<PathBuf> {
        self.loaded.lock().unwrap().clone()
    }

    /// Simulate the native side dropping its context behind our back.
    pub fn lose_context(&self) {
        self.lost_context.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl InferenceEngine for FakeEngine {
    async fn load(
        &self,
        path: &Path,
        params: &EngineLoadParams,
        progress: LoadProgressCallback,
    ) -> Result<EngineModelInfo, EngineError> {
        if self.loading.swap(true, Ordering::SeqCst) {
            self.overlapping_loads.store(true, Ordering::SeqCst);
        }
        self.loads.fetch_add(1, Ordering::SeqCst);

        let (delay, fail) = {
            let mut script = self.script.lock().unwrap();
            let fail = script.load_failures > 0;
            if fail {
                script.load_failures -= 1;
            }
            (script.load_delay, fail)
        };

        progress(0.0);
        tokio::time::sleep(delay / 2).await;
        progress(0.5);
        tokio::time::sleep(delay / 2).await;

        let result = if fail {
            Err(EngineError::new(EngineErrorKind::OutOfMemory, "scripted load failure"))
        } else {
            progress(1.0);
            let live = self.live_contexts.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_live_contexts.fetch_max(live, Ordering::SeqCst);
            self.lost_context.store(false, Ordering::SeqCst);
            *self.loaded.lock().unwrap() = Some(path.to_path_buf());
            Ok(EngineModelInfo {
                context_length: params.context_length.unwrap_or(2048).min(4096),
                gpu: false,
            })
        };
        self.loading.store(false, Ordering::SeqCst);
        result
    }

    async fn release(&self) -> Result<(), EngineError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.loaded.lock().unwrap().take().is_some() {
            self.live_contexts.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn state(&self) -> EngineState {
        if self.lost_context.load(Ordering::SeqCst) || self.loaded.lock().unwrap().is_none() {
            EngineState::Idle
        } else if self.generating.load(Ordering::SeqCst) {
            EngineState::Busy
        } else {
            EngineState::Ready
        }
    }

    async fn generate(
        &self,
        _prompt: &Prompt,
        _params: &InferenceConfig,
        on_token: TokenCallback,
    ) -> Result<EngineCompletion, EngineError> {
        let cancel = {
            let token = CancellationToken::new();
            *self.cancel.lock().unwrap() = token.clone();
            token
        };
        let script = {
            let mut script = self.script.lock().unwrap();
            let snapshot = script.clone();
            script.generate_error = None;
            snapshot
        };
        if let Some(err) = script.generate_error {
            return Err(err);
        }

        self.generating.store(true, Ordering::SeqCst);
        let mut text = String::new();
        let mut tokens = 0u32;
        let mut stop_reason = EngineStopReason::EndOfSequence;

        for (i, piece) in script.tokens.iter().enumerate() {
            if script.stall_after == Some(i) {
                break;
            }
            if cancel.is_cancelled() {
                stop_reason = EngineStopReason::Cancelled;
                break;
            }
            if !script.token_delay.is_zero() {
                tokio::time::sleep(script.token_delay).await;
            }
            on_token(piece);
            text.push_str(piece);
            tokens += 1;
        }

        if script.stall_after.is_some() && stop_reason != EngineStopReason::Cancelled {
            if script.ack_cancel {
                cancel.cancelled().await;
                stop_reason = EngineStopReason::Cancelled;
            } else {
                std::future::pending::<()>().await;
            }
        }

        self.generating.store(false, Ordering::SeqCst);
        Ok(EngineCompletion {
            text,
            tokens,
            stop_reason,
        })
    }

    async fn cancel(&self) -> Result<(), EngineError> {
        self.cancel.lock().unwrap().cancel();
        Ok(())
    }
}

/// Settings with short timeouts and a tiny integrity floor.
pub fn fast_settings() -> Settings {
    Settings {
        idle_timeout_ms: Some(150),
        hard_timeout_ms: Some(600),
        stop_grace_ms: Some(100),
        busy_retry_after_ms: Some(250),
        max_load_failures: Some(3),
        min_model_size_bytes: Some(64),
        ..Settings::with_defaults()
    }
}

/// Valid model bytes: GGUF magic followed by padding.
pub fn model_bytes() -> Vec<u8> {
    let mut data = vec![0u8; MODEL_FILE_SIZE];
    data[..4].copy_from_slice(&GGUF_MAGIC);
    data
}

/// Services over in-memory repositories and a [`FakeEngine`].
pub struct Harness {
    pub services: AppServices,
    pub engine: Arc<FakeEngine>,
    pub segments: Arc<InMemorySegmentRepository>,
    pub dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_settings(fast_settings()).await
    }

    pub async fn with_settings(settings: Settings) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let segments = Arc::new(InMemorySegmentRepository::new());
        let repos = Repos::new(
            Arc::new(InMemoryArtifactRepository::new()),
            Arc::new(InMemoryModelSettingsRepository::new()),
            segments.clone(),
            Arc::new(InMemorySettingsRepository::with_settings(settings)),
        );
        let engine = FakeEngine::new();
        let services = AppServices::new(repos, engine.clone(), dir.path().join("models"), None)
            .await
            .unwrap();
        services.start().await.unwrap();

        Self {
            services,
            engine,
            segments,
            dir,
        }
    }

    /// Import a valid model named after `filename`.
    pub async fn import(&self, filename: &str) -> ModelArtifact {
        let request = ImportRequest::new(
            ImportSource::Bytes {
                filename: filename.to_string(),
                data: model_bytes(),
            },
            OwnerId::new("tester"),
        );
        self.services.store.import(request).await.unwrap()
    }

    pub fn path_of(&self, artifact: &ModelArtifact) -> PathBuf {
        self.services.store.path_for(artifact).unwrap()
    }
}

/// Wait until `check` holds, polling every few milliseconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
