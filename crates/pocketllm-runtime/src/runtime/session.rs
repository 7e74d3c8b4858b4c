//! Exclusive claim on the native context for one generation.

use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::warn;

use pocketllm_core::{LoadedModel, RuntimeState};

use super::RuntimeInner;

/// Holds the native lock and the `generating` state for one generation.
///
/// Dropping the session returns the runtime to `ready`, whatever path the
/// generation left by. [`invalidate`](Self::invalidate) tears the context
/// down instead.
pub(crate) struct GenerationSession {
    inner: Arc<RuntimeInner>,
    model: LoadedModel,
    finished: bool,
    _native: OwnedMutexGuard<()>,
}

impl GenerationSession {
    pub(super) fn new(
        inner: Arc<RuntimeInner>,
        native: OwnedMutexGuard<()>,
        model: LoadedModel,
    ) -> Self {
        Self {
            inner,
            model,
            finished: false,
            _native: native,
        }
    }

    pub(crate) const fn model(&self) -> &LoadedModel {
        &self.model
    }

    /// The native context can no longer be trusted. Release it and move the
    /// runtime to `error`; the next `initialize` reloads.
    pub(crate) async fn invalidate(mut self, reason: &str) {
        self.finished = true;
        warn!(model = %self.model.model_name, reason, "Tearing down invalid native context");

        if let Err(e) = self.inner.engine.release().await {
            warn!(error = %e, "Native release after invalid context failed");
        }
        {
            let mut slot = self.inner.lock_slot();
            slot.context = None;
            self.inner.transition(&mut slot, RuntimeState::Error);
        }
        self.inner.after_unload(&self.model).await;
    }
}

impl Drop for GenerationSession {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut slot = self.inner.lock_slot();
        if slot.state == RuntimeState::Generating {
            self.inner.transition(&mut slot, RuntimeState::Ready);
        }
    }
}
