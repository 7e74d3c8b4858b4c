//! Generation orchestrator.
//!
//! Serializes generation requests against the single [`InferenceRuntime`]:
//! a second request while one is running is rejected with `Busy`, never
//! queued. Each request ensures its model is loaded, streams tokens into a
//! unified progress signal and settles in bounded time:
//!
//! - token silence of `idle_timeout` after the first token finalizes the
//!   request with the partial text (`stopped_at_limit`);
//! - no token within `hard_timeout` fails it with `Timeout`;
//! - [`GenerationOrchestrator::stop_generation`] cancels natively and, after
//!   `stop_grace`, finalizes with the partial text.

mod guard;
pub mod progress;

use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant as StdInstant;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pocketllm_core::{
    AppEventEmitter, ArtifactId, ChatMessage, EngineCompletion, EngineError, EngineErrorKind,
    EngineLoadParams, EngineStopReason, FinishReason, GenerationRequest, GenerationResult,
    InferenceConfig, LoadProgressCallback, Prompt, ThinkingFormat, ThinkingRecorder,
    TokenCallback,
};

use crate::error::RuntimeError;
use crate::runtime::{GenerationSession, InferenceRuntime};
use guard::{InUse, InUseGuard};
use progress::{
    DONE, GENERATION_START, LOAD_END, ProgressReporter, generation_percent, load_percent,
};

type Generation<'a> = BoxFuture<'a, Result<EngineCompletion, EngineError>>;

/// Text gathered from one native generation.
struct Streamed {
    text: String,
    tokens: u32,
    finish: FinishReason,
}

impl Streamed {
    const fn stopped_at_limit(&self) -> bool {
        !matches!(self.finish, FinishReason::Completed)
    }
}

enum StreamFailure {
    Engine(EngineError),
    Timeout,
}

enum Ended {
    Finished(Result<EngineCompletion, EngineError>),
    Cancelled,
    Idle,
    HardTimeout,
}

/// Drives generations against the inference runtime, one at a time.
pub struct GenerationOrchestrator {
    runtime: InferenceRuntime,
    recorder: ThinkingRecorder,
    emitter: Arc<dyn AppEventEmitter>,
    in_use: InUse,
}

impl GenerationOrchestrator {
    pub fn new(
        runtime: InferenceRuntime,
        recorder: ThinkingRecorder,
        emitter: Arc<dyn AppEventEmitter>,
    ) -> Self {
        Self {
            runtime,
            recorder,
            emitter,
            in_use: InUse::new(),
        }
    }

    pub const fn runtime(&self) -> &InferenceRuntime {
        &self.runtime
    }

    /// Raw text completion.
    pub async fn complete(
        &self,
        artifact_id: &ArtifactId,
        prompt: impl Into<String>,
        options: InferenceConfig,
    ) -> Result<GenerationResult, RuntimeError> {
        self.generate(GenerationRequest::new(
            artifact_id.clone(),
            Prompt::Text(prompt.into()),
            options,
        ))
        .await
    }

    /// Chat completion over a message list.
    pub async fn chat_complete(
        &self,
        artifact_id: &ArtifactId,
        messages: Vec<ChatMessage>,
        options: InferenceConfig,
    ) -> Result<GenerationResult, RuntimeError> {
        self.generate(GenerationRequest::new(
            artifact_id.clone(),
            Prompt::Chat(messages),
            options,
        ))
        .await
    }

    /// Run one generation request.
    ///
    /// Fails with `Busy` if another request holds the runtime. The hard
    /// timeout runs from the moment the request is accepted, so it covers a
    /// model load as well as the wait for the first token.
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, RuntimeError> {
        let policy = self.runtime.policy().clone();
        let Some(guard) = InUseGuard::try_acquire(&self.in_use) else {
            debug!(request_id = %request.request_id, "Rejecting generation: runtime busy");
            return Err(RuntimeError::Busy {
                retry_after: policy.busy_retry_after,
            });
        };
        let started = StdInstant::now();
        let hard_deadline = Instant::now() + policy.hard_timeout;

        let store = self.runtime.store();
        let artifact = store
            .get_by_id(&request.artifact_id)
            .ok_or_else(|| RuntimeError::ModelNotFound(request.artifact_id.to_string()))?;
        let path = store.path_for(&artifact)?;

        let reporter = Arc::new(ProgressReporter::new(
            request.progress_topic(),
            request.progress.clone(),
            Arc::clone(&self.emitter),
        ));

        let needs_load = self
            .runtime
            .current()
            .is_none_or(|loaded| loaded.path != path);
        if needs_load {
            reporter.report(0);
            let load_reporter = Arc::clone(&reporter);
            let on_progress: LoadProgressCallback =
                Arc::new(move |fraction: f32| load_reporter.report(load_percent(fraction)));
            let load = self.runtime.initialize_with_progress(
                &path,
                EngineLoadParams::default(),
                Some(on_progress),
            );
            // The load itself is spawned and keeps going after we give up on it
            match tokio::time::timeout_at(hard_deadline, load).await {
                Ok(loaded) => {
                    loaded?;
                }
                Err(_) => {
                    warn!(
                        request_id = %request.request_id,
                        waited = ?policy.hard_timeout,
                        "Model load did not finish before the hard timeout"
                    );
                    return Err(RuntimeError::Timeout {
                        waited: policy.hard_timeout,
                    });
                }
            }
        }
        reporter.report(LOAD_END);

        let options = store
            .settings()
            .resolve_options(&artifact.name, &request.options)
            .await?;

        let session = self.runtime.begin_generation(&path).await?;
        reporter.report(GENERATION_START);
        info!(
            request_id = %request.request_id,
            model = %session.model().model_name,
            "Generation started"
        );

        let streamed = match self
            .stream(&request.prompt, &options, guard.token(), &reporter, hard_deadline)
            .await
        {
            Ok(streamed) => {
                drop(session);
                streamed
            }
            Err(StreamFailure::Engine(e)) => return Err(generation_failed(session, &e).await),
            Err(StreamFailure::Timeout) => {
                drop(session);
                warn!(
                    request_id = %request.request_id,
                    waited = ?policy.hard_timeout,
                    "Generation produced no tokens before the hard timeout"
                );
                return Err(RuntimeError::Timeout {
                    waited: policy.hard_timeout,
                });
            }
        };
        drop(guard);

        let format = ThinkingFormat::for_model(&artifact.name, artifact.capabilities);
        let recorded = self
            .recorder
            .record(&streamed.text, format, Some(&artifact.id))
            .await;
        reporter.report(DONE);

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            request_id = %request.request_id,
            tokens = streamed.tokens,
            finish = ?streamed.finish,
            elapsed_ms,
            "Generation finished"
        );

        Ok(GenerationResult {
            request_id: request.request_id,
            stopped_at_limit: streamed.stopped_at_limit(),
            finish_reason: streamed.finish,
            token_count: streamed.tokens,
            text: streamed.text,
            visible_text: recorded.visible_text,
            segments: recorded.segments,
            elapsed_ms,
        })
    }

    /// Stop the running generation, if any.
    ///
    /// Waits until the generation has settled and the runtime is back to
    /// `ready`. Idempotent: returns `false` when nothing was running.
    pub async fn stop_generation(&self) -> bool {
        if !self.in_use.cancel_active() {
            return false;
        }
        info!("Stop requested for active generation");

        let grace = self.runtime.policy().stop_grace;
        if !self.in_use.wait_idle(grace * 2).await {
            warn!("Generation did not settle after stop; it will finish on its own");
        }
        true
    }

    /// Whether a generation currently holds the runtime.
    pub fn is_busy(&self) -> bool {
        self.in_use.is_set()
    }

    async fn stream(
        &self,
        prompt: &Prompt,
        options: &InferenceConfig,
        cancel: &CancellationToken,
        reporter: &ProgressReporter,
        hard_deadline: Instant,
    ) -> Result<Streamed, StreamFailure> {
        let policy = self.runtime.policy();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let on_token: TokenCallback = Arc::new(move |piece: &str| {
            let _ = tx.send(piece.to_string());
        });

        let engine = Arc::clone(self.runtime.engine());
        let mut generation = engine.generate(prompt, options, on_token);

        let max_tokens = options.max_tokens.unwrap_or_default();
        let mut text = String::new();
        let mut tokens = 0u32;
        let mut idle_deadline = hard_deadline;

        let ended = loop {
            let deadline = if tokens == 0 {
                hard_deadline
            } else {
                idle_deadline
            };
            tokio::select! {
                biased;
                Some(piece) = rx.recv() => {
                    text.push_str(&piece);
                    tokens += 1;
                    idle_deadline = Instant::now() + policy.idle_timeout;
                    reporter.report(generation_percent(tokens, max_tokens));
                }
                result = &mut generation => break Ended::Finished(result),
                () = cancel.cancelled() => break Ended::Cancelled,
                () = tokio::time::sleep_until(deadline) => {
                    break if tokens == 0 { Ended::HardTimeout } else { Ended::Idle };
                }
            }
        };

        let finish = match ended {
            Ended::Finished(Ok(completion)) => {
                drain(&mut rx, &mut text, &mut tokens);
                let finish = if completion.stop_reason == EngineStopReason::Cancelled {
                    FinishReason::Cancelled
                } else {
                    FinishReason::Completed
                };
                if !completion.text.is_empty() {
                    text = completion.text;
                }
                return Ok(Streamed {
                    text,
                    tokens: tokens.max(completion.tokens),
                    finish,
                });
            }
            Ended::Finished(Err(e)) if e.kind == EngineErrorKind::Cancelled => {
                drain(&mut rx, &mut text, &mut tokens);
                FinishReason::Cancelled
            }
            Ended::Finished(Err(e)) => return Err(StreamFailure::Engine(e)),
            Ended::Cancelled => {
                self.stop_native(&mut generation, "cancelled").await;
                FinishReason::Cancelled
            }
            Ended::Idle => {
                debug!(tokens, "No token within idle timeout; finalizing");
                self.stop_native(&mut generation, "idle timeout").await;
                FinishReason::IdleTimeout
            }
            Ended::HardTimeout => {
                self.stop_native(&mut generation, "hard timeout").await;
                return Err(StreamFailure::Timeout);
            }
        };

        drain(&mut rx, &mut text, &mut tokens);
        Ok(Streamed {
            text,
            tokens,
            finish,
        })
    }

    /// Ask the engine to stop and give it `stop_grace` to acknowledge.
    async fn stop_native(&self, generation: &mut Generation<'_>, reason: &str) {
        if let Err(e) = self.runtime.engine().cancel().await {
            warn!(error = %e, reason, "Native cancel failed");
        }
        let grace = self.runtime.policy().stop_grace;
        match tokio::time::timeout(grace, generation).await {
            Ok(_) => debug!(reason, "Engine acknowledged stop"),
            Err(_) => warn!(
                reason,
                ?grace,
                "Engine did not acknowledge stop; finalizing with partial output"
            ),
        }
    }
}

async fn generation_failed(session: GenerationSession, e: &EngineError) -> RuntimeError {
    let context_invalidated = e.indicates_invalid_context();
    warn!(error = %e, context_invalidated, "Generation failed");
    if context_invalidated {
        session.invalidate(&e.message).await;
    } else {
        drop(session);
    }
    RuntimeError::Generation {
        message: e.to_string(),
        context_invalidated,
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<String>, text: &mut String, tokens: &mut u32) {
    while let Ok(piece) = rx.try_recv() {
        text.push_str(&piece);
        *tokens += 1;
    }
}
