//! Outbound port for lifecycle and progress events.

use crate::events::AppEvent;

/// Sink for [`AppEvent`]s.
///
/// Services hold an `Arc<dyn AppEventEmitter>`; the runtime crate's
/// `EventBus` is the real implementation. Emitting must not block: it is
/// called while the runtime holds its state lock.
pub trait AppEventEmitter: Send + Sync {
    fn emit(&self, event: AppEvent);
}

/// Discards every event. Used by the CLI, which has no listeners.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl AppEventEmitter for NoopEmitter {
    fn emit(&self, _event: AppEvent) {}
}
