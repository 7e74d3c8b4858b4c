//! Typed publish/subscribe bus for [`AppEvent`]s.
//!
//! Two kinds of subscription exist:
//!
//! - [`EventBus::subscribe_reliable`] returns an unbounded receiver that gets
//!   every [`Delivery::Reliable`] event exactly once, in publish order.
//! - [`EventBus::subscribe`] returns a broadcast receiver that sees every
//!   event, reliable or not, but drops events when it lags behind.
//!
//! `GenerationProgress` is the only lossy event kind.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tracing::trace;

use pocketllm_core::{AppEvent, AppEventEmitter, Delivery};

/// Broadcast channel capacity for the lossy stream.
const CHANNEL_CAPACITY: usize = 64;

struct BusInner {
    sender: broadcast::Sender<AppEvent>,
    reliable: Mutex<Vec<mpsc::UnboundedSender<AppEvent>>>,
}

/// Event bus shared by the catalog, the runtime and the orchestrator.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a new bus with no subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                sender,
                reliable: Mutex::new(Vec::new()),
            }),
        }
    }

    fn reliable(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<AppEvent>>> {
        self.inner
            .reliable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish an event to every subscriber.
    pub fn publish(&self, event: AppEvent) {
        trace!(event = event.event_name(), "Publishing event");
        if event.delivery() == Delivery::Reliable {
            self.reliable()
                .retain(|tx| tx.send(event.clone()).is_ok());
        }
        // No receivers is not an error
        let _ = self.inner.sender.send(event);
    }

    /// Subscribe to all events; lagging receivers lose events.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.inner.sender.subscribe()
    }

    /// Subscribe to reliable events only; nothing is ever dropped.
    pub fn subscribe_reliable(&self) -> mpsc::UnboundedReceiver<AppEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.reliable().push(tx);
        rx
    }

    /// Number of live reliable subscribers.
    pub fn reliable_subscriber_count(&self) -> usize {
        let mut subs = self.reliable();
        subs.retain(|tx| !tx.is_closed());
        subs.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl AppEventEmitter for EventBus {
    fn emit(&self, event: AppEvent) {
        self.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocketllm_core::ArtifactId;

    #[tokio::test]
    async fn test_reliable_subscriber_gets_lifecycle_events_only() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_reliable();

        bus.publish(AppEvent::generation_progress("t", 10));
        bus.publish(AppEvent::models_updated());
        bus.publish(AppEvent::model_removed(ArtifactId::for_name("m")));

        assert_eq!(rx.recv().await.unwrap(), AppEvent::models_updated());
        assert!(matches!(
            rx.recv().await.unwrap(),
            AppEvent::ModelRemoved { .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reliable_subscriber_never_lags() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_reliable();
        for _ in 0..(CHANNEL_CAPACITY * 3) {
            bus.publish(AppEvent::models_updated());
        }
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, CHANNEL_CAPACITY * 3);
    }

    #[tokio::test]
    async fn test_broadcast_subscriber_lags_on_overflow() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        for i in 0..(CHANNEL_CAPACITY + 10) {
            bus.publish(AppEvent::generation_progress("t", (i % 100) as u8));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }

    #[test]
    fn test_dropped_reliable_subscribers_are_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe_reliable();
        assert_eq!(bus.reliable_subscriber_count(), 1);
        drop(rx);
        bus.publish(AppEvent::models_updated());
        assert_eq!(bus.reliable_subscriber_count(), 0);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        let emitter: Arc<dyn AppEventEmitter> = Arc::new(bus.clone());
        emitter.emit(AppEvent::models_updated());
        bus.emit(AppEvent::models_updated());
    }
}
