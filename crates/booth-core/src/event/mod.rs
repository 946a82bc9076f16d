//! Event fan-out to external consumers.
//!
//! The API, CLI and GUI adapters observe the core through registered
//! event sinks. Dispatch is best-effort: a panicking sink is caught and
//! logged, and never interrupts emission to the remaining sinks or the
//! task that raised the event.
//!
//! ## Event types
//!
//! | Event | Data |
//! |-------|------|
//! | `peer_discovered` / `peer_lost` | `Peer` |
//! | `transfer_request` / `transfer_state` / `transfer_progress` | `TransferInfo` |
//! | `notification` | `{type, message}` |

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::Value;

use crate::discovery::Peer;
use crate::transfer::{TransferInfo, TransferState};

/// A registered event consumer.
///
/// Implementations must be safe to call concurrently: events are emitted
/// from whichever task detects the change.
pub trait EventSink: Send + Sync {
    /// Handle one event. `data` is a JSON object (`Peer`, `TransferInfo`
    /// or a notification record depending on `event`).
    fn on_event(&self, event: &str, data: &Value);
}

/// Fan-out bus for core events.
///
/// Cloning is cheap; all clones share the same sink registry.
#[derive(Clone, Default)]
pub struct EventBus {
    sinks: Arc<RwLock<Vec<Arc<dyn EventSink>>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .sinks
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len();
        f.debug_struct("EventBus").field("sinks", &count).finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event sink.
    pub fn register(&self, sink: Arc<dyn EventSink>) {
        self.sinks
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(sink);
    }

    /// Emit an event to every registered sink.
    pub fn emit(&self, event: &str, data: &Value) {
        let sinks = self
            .sinks
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        for sink in sinks {
            if catch_unwind(AssertUnwindSafe(|| sink.on_event(event, data))).is_err() {
                tracing::error!("Event sink panicked handling '{event}'");
            }
        }
    }

    fn emit_serialized<T: Serialize>(&self, event: &str, data: &T) {
        match serde_json::to_value(data) {
            Ok(value) => self.emit(event, &value),
            Err(e) => tracing::error!("Failed to serialize '{event}' event data: {e}"),
        }
    }

    /// Emit `peer_discovered` for a newly seen peer.
    pub fn peer_discovered(&self, peer: &Peer) {
        self.emit_serialized("peer_discovered", peer);
    }

    /// Emit `peer_lost` for an evicted peer.
    pub fn peer_lost(&self, peer: &Peer) {
        self.emit_serialized("peer_lost", peer);
    }

    /// Emit `transfer_request` for an incoming transfer awaiting the user.
    pub fn transfer_request(&self, info: &TransferInfo) {
        self.emit_serialized("transfer_request", info);
    }

    /// Emit `transfer_progress` for a progress update.
    pub fn transfer_progress(&self, info: &TransferInfo) {
        self.emit_serialized("transfer_progress", info);
    }

    /// Emit `transfer_state` for a state change, plus the human-readable
    /// `notification` that accompanies terminal states.
    pub fn transfer_state(&self, info: &TransferInfo) {
        self.emit_serialized("transfer_state", info);

        let notification = match info.state {
            TransferState::Completed => {
                let direction = if info.direction.is_sending() {
                    "sent"
                } else {
                    "received"
                };
                Some((
                    "success",
                    format!("'{}' {direction} successfully!", info.file_name),
                ))
            }
            TransferState::Failed => Some((
                "error",
                format!(
                    "Transfer of '{}' failed: {}",
                    info.file_name,
                    info.error_message.as_deref().unwrap_or("unknown error")
                ),
            )),
            TransferState::Cancelled => {
                Some(("info", format!("Transfer of '{}' cancelled.", info.file_name)))
            }
            TransferState::Rejected => Some((
                "warning",
                format!("Transfer of '{}' was rejected.", info.file_name),
            )),
            _ => None,
        };

        if let Some((kind, message)) = notification {
            self.notification(kind, &message);
        }
    }

    /// Emit a free-form `notification` event.
    pub fn notification(&self, kind: &str, message: &str) {
        self.emit(
            "notification",
            &serde_json::json!({ "type": kind, "message": message }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TransferDirection;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(String, Value)>>,
    }

    impl EventSink for RecordingSink {
        fn on_event(&self, event: &str, data: &Value) {
            self.events
                .lock()
                .expect("lock")
                .push((event.to_string(), data.clone()));
        }
    }

    struct PanickingSink;

    impl EventSink for PanickingSink {
        fn on_event(&self, _event: &str, _data: &Value) {
            panic!("sink blew up");
        }
    }

    fn test_info(state: TransferState) -> TransferInfo {
        let mut info = TransferInfo::new(
            "t-1".to_string(),
            "foo.bin".to_string(),
            1024,
            TransferDirection::Sending,
            "peer-id".to_string(),
            "Peer Name".to_string(),
        );
        info.state = state;
        info
    }

    #[test]
    fn test_emit_reaches_all_sinks() {
        let bus = EventBus::new();
        let first = Arc::new(RecordingSink::default());
        let second = Arc::new(RecordingSink::default());
        bus.register(first.clone());
        bus.register(second.clone());

        bus.notification("info", "hello");

        assert_eq!(first.events.lock().expect("lock").len(), 1);
        assert_eq!(second.events.lock().expect("lock").len(), 1);
    }

    #[test]
    fn test_panicking_sink_does_not_interrupt_others() {
        let bus = EventBus::new();
        let recorder = Arc::new(RecordingSink::default());
        bus.register(Arc::new(PanickingSink));
        bus.register(recorder.clone());

        bus.notification("info", "still delivered");

        let events = recorder.events.lock().expect("lock");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "notification");
    }

    #[test]
    fn test_terminal_state_emits_notification() {
        let bus = EventBus::new();
        let recorder = Arc::new(RecordingSink::default());
        bus.register(recorder.clone());

        bus.transfer_state(&test_info(TransferState::Completed));

        let events = recorder.events.lock().expect("lock");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, "transfer_state");
        assert_eq!(events[1].0, "notification");
        assert_eq!(events[1].1["type"], "success");
        assert!(events[1].1["message"]
            .as_str()
            .expect("message")
            .contains("foo.bin"));
    }

    #[test]
    fn test_non_terminal_state_has_no_notification() {
        let bus = EventBus::new();
        let recorder = Arc::new(RecordingSink::default());
        bus.register(recorder.clone());

        bus.transfer_state(&test_info(TransferState::Transferring));

        assert_eq!(recorder.events.lock().expect("lock").len(), 1);
    }

    #[test]
    fn test_rejected_state_is_warning() {
        let bus = EventBus::new();
        let recorder = Arc::new(RecordingSink::default());
        bus.register(recorder.clone());

        bus.transfer_state(&test_info(TransferState::Rejected));

        let events = recorder.events.lock().expect("lock");
        assert_eq!(events[1].1["type"], "warning");
    }
}
