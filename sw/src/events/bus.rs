//! Event Bus - pub/sub for coordinator activity
//!
//! The EventBus uses a tokio broadcast channel. The coordinator emits, and any
//! number of consumers (CLI trace printer, tests) subscribe.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::CoordinatorEvent;
use crate::domain::{Discovery, WorkerState};

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Central event bus for coordinator activity
pub struct EventBus {
    tx: broadcast::Sender<CoordinatorEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped.
    pub fn emit(&self, event: CoordinatorEvent) {
        debug!(event_type = event.event_type(), script_url = event.script_url(), "EventBus::emit");
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter bound to one worker script
    pub fn emitter_for(&self, script_url: impl Into<String>) -> EventEmitter {
        let script_url = script_url.into();
        debug!(%script_url, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: self.tx.clone(),
            script_url,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Cheap, cloneable handle that stamps every event with its script URL
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<CoordinatorEvent>,
    script_url: String,
}

impl EventEmitter {
    pub fn script_url(&self) -> &str {
        &self.script_url
    }

    /// Emit a raw event
    pub fn emit(&self, event: CoordinatorEvent) {
        debug!(event_type = event.event_type(), "EventEmitter::emit");
        let _ = self.tx.send(event);
    }

    // === Convenience methods ===

    pub fn unsupported(&self) {
        self.emit(CoordinatorEvent::Unsupported {
            script_url: self.script_url.clone(),
        });
    }

    pub fn registered(&self, has_controller: bool) {
        self.emit(CoordinatorEvent::Registered {
            script_url: self.script_url.clone(),
            has_controller,
        });
    }

    pub fn registration_failed(&self, message: &str) {
        self.emit(CoordinatorEvent::RegistrationFailed {
            script_url: self.script_url.clone(),
            message: message.to_string(),
        });
    }

    pub fn fresh_install(&self) {
        self.emit(CoordinatorEvent::FreshInstall {
            script_url: self.script_url.clone(),
        });
    }

    pub fn watch_started(&self, discovery: Discovery, state: WorkerState) {
        self.emit(CoordinatorEvent::WatchStarted {
            script_url: self.script_url.clone(),
            discovery,
            state,
        });
    }

    pub fn state_observed(&self, discovery: Discovery, state: WorkerState) {
        self.emit(CoordinatorEvent::StateObserved {
            script_url: self.script_url.clone(),
            discovery,
            state,
        });
    }

    pub fn watch_abandoned(&self, discovery: Discovery) {
        self.emit(CoordinatorEvent::WatchAbandoned {
            script_url: self.script_url.clone(),
            discovery,
        });
    }

    pub fn watch_bypassed(&self, discovery: Discovery, state: WorkerState) {
        self.emit(CoordinatorEvent::WatchBypassed {
            script_url: self.script_url.clone(),
            discovery,
            state,
        });
    }

    pub fn control_message_sent(&self, discovery: Discovery) {
        self.emit(CoordinatorEvent::ControlMessageSent {
            script_url: self.script_url.clone(),
            discovery,
        });
    }

    pub fn control_message_failed(&self, discovery: Discovery, message: &str) {
        self.emit(CoordinatorEvent::ControlMessageFailed {
            script_url: self.script_url.clone(),
            discovery,
            message: message.to_string(),
        });
    }

    pub fn reloaded(&self) {
        self.emit(CoordinatorEvent::Reloaded {
            script_url: self.script_url.clone(),
        });
    }

    pub fn reload_suppressed(&self) {
        self.emit(CoordinatorEvent::ReloadSuppressed {
            script_url: self.script_url.clone(),
        });
    }
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::with_default_capacity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let bus = EventBus::new(0);
        let mut rx = bus.subscribe();
        bus.emitter_for("sw.js").fresh_install();
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_dropped() {
        let bus = EventBus::new(16);
        bus.emitter_for("sw.js").reloaded();

        let mut rx = bus.subscribe();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_emitter_stamps_script_url() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for("/static/sw.js");

        emitter.registered(true);
        emitter.watch_started(Discovery::Waiting, WorkerState::Installed);
        emitter.control_message_sent(Discovery::Waiting);

        let mut types = Vec::new();
        for _ in 0..3 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.script_url(), "/static/sw.js");
            types.push(event.event_type());
        }
        assert_eq!(types, vec!["Registered", "WatchStarted", "ControlMessageSent"]);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = create_event_bus();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(CoordinatorEvent::Unsupported {
            script_url: "sw.js".to_string(),
        });

        assert_eq!(rx1.recv().await.unwrap().event_type(), "Unsupported");
        assert_eq!(rx2.recv().await.unwrap().event_type(), "Unsupported");
    }
}
