//! Translation of load and token callbacks into one progress percentage.
//!
//! Loading maps to 0-85, generation to 90-100. Reports never go backwards.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use pocketllm_core::{AppEvent, AppEventEmitter, ProgressSink};

/// Percentage reported when the model is ready.
pub const LOAD_END: u8 = 85;

/// Percentage reported when token generation starts.
pub const GENERATION_START: u8 = 90;

pub const DONE: u8 = 100;

const NOTHING_REPORTED: u8 = u8::MAX;

/// Map a native load fraction onto `0..=LOAD_END`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn load_percent(fraction: f32) -> u8 {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    (fraction * f32::from(LOAD_END)).round() as u8
}

/// Map a token count onto `GENERATION_START..DONE`.
///
/// 100 is reserved for the finished result.
pub fn generation_percent(tokens: u32, max_tokens: u32) -> u8 {
    let span = u32::from(DONE - GENERATION_START - 1);
    if max_tokens == 0 {
        return GENERATION_START;
    }
    let step = (u64::from(tokens) * u64::from(span + 1) / u64::from(max_tokens)).min(u64::from(span));
    GENERATION_START + u8::try_from(step).unwrap_or(DONE - GENERATION_START - 1)
}

/// Publishes monotonic progress for one request to its sink and the event
/// bus.
pub(crate) struct ProgressReporter {
    topic: String,
    sink: Option<ProgressSink>,
    emitter: Arc<dyn AppEventEmitter>,
    last: AtomicU8,
}

impl ProgressReporter {
    pub(crate) fn new(
        topic: String,
        sink: Option<ProgressSink>,
        emitter: Arc<dyn AppEventEmitter>,
    ) -> Self {
        Self {
            topic,
            sink,
            emitter,
            last: AtomicU8::new(NOTHING_REPORTED),
        }
    }

    pub(crate) fn report(&self, percent: u8) {
        let percent = percent.min(DONE);
        let advanced = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                (last == NOTHING_REPORTED || percent > last).then_some(percent)
            })
            .is_ok();
        if !advanced {
            return;
        }
        if let Some(sink) = &self.sink {
            sink(percent);
        }
        self.emitter
            .emit(AppEvent::generation_progress(self.topic.clone(), percent));
    }

    /// Last percentage reported, if any.
    #[cfg(test)]
    pub(crate) fn last(&self) -> Option<u8> {
        let last = self.last.load(Ordering::SeqCst);
        (last != NOTHING_REPORTED).then_some(last)
    }
}
