//! Outbound event queue — trait for emitting platform events from any module.
//!
//! The ledger and pacer accept an `Arc<dyn EventSink>` to emit `low_balance`,
//! `budget_exhausted`, and `campaign_status_changed` events toward the
//! external notifier, decoupled from the request path.

use crate::types::{PlatformEvent, PlatformEventType};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Trait for emitting platform events. Implementations route events to the
/// external notifier with at-least-once delivery.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PlatformEvent);
}

/// No-op sink for tests and modules that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: PlatformEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<PlatformEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<PlatformEvent> {
        self.events.lock().expect("event bus mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().expect("event bus mutex poisoned").len()
    }

    pub fn count_type(&self, event_type: PlatformEventType) -> usize {
        self.events
            .lock()
            .expect("event bus mutex poisoned")
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().expect("event bus mutex poisoned").clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: PlatformEvent) {
        self.events.lock().expect("event bus mutex poisoned").push(event);
    }
}

/// Convenience builder for creating `PlatformEvent` with minimal boilerplate.
pub fn make_event(
    event_type: PlatformEventType,
    owner: impl Into<String>,
    campaign_id: Option<Uuid>,
    amount_cents: Option<i64>,
) -> PlatformEvent {
    PlatformEvent {
        event_id: Uuid::new_v4(),
        event_type,
        owner: owner.into(),
        campaign_id,
        amount_cents,
        detail: None,
        timestamp: Utc::now(),
    }
}

/// Convenience: create a no-op event sink for modules that don't need one.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_sink() {
        let sink = capture_sink();
        assert_eq!(sink.count(), 0);

        sink.emit(make_event(
            PlatformEventType::LowBalance,
            "adv-1",
            None,
            Some(500),
        ));
        sink.emit(make_event(
            PlatformEventType::BudgetExhausted,
            "adv-1",
            Some(Uuid::new_v4()),
            None,
        ));

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.count_type(PlatformEventType::LowBalance), 1);
        assert_eq!(sink.count_type(PlatformEventType::BudgetExhausted), 1);

        let events = sink.events();
        assert_eq!(events[0].owner, "adv-1");
        assert_eq!(events[0].amount_cents, Some(500));
    }

    #[test]
    fn test_noop_sink() {
        let sink = noop_sink();
        // Should not panic
        sink.emit(make_event(PlatformEventType::LowBalance, "adv-1", None, None));
    }
}
