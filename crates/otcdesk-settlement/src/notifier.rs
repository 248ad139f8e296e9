//! Event notifiers.
//!
//! Notification is best-effort: `notify` cannot fail, and nothing the engine
//! decides depends on what a notifier does with the event.

use otcdesk_types::{DealEvent, DealId, constants};

/// Receives every committed state change.
pub trait EventNotifier {
    fn notify(&mut self, event: &DealEvent);
}

/// Append-only in-memory record of emitted events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<DealEvent>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in emission order.
    #[must_use]
    pub fn events(&self) -> &[DealEvent] {
        &self.events
    }

    #[must_use]
    pub fn last(&self) -> Option<&DealEvent> {
        self.events.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events concerning `deal_id`.
    pub fn for_deal(&self, deal_id: DealId) -> impl Iterator<Item = &DealEvent> {
        self.events
            .iter()
            .filter(move |e| e.kind.deal_id() == Some(deal_id))
    }

    /// Names of all events, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events.iter().map(DealEvent::name).collect()
    }
}

impl EventNotifier for EventLog {
    fn notify(&mut self, event: &DealEvent) {
        self.events.push(event.clone());
    }
}

/// Writes each event as one structured `tracing` record, tagged with the
/// protocol name and version.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl EventNotifier for TracingNotifier {
    fn notify(&mut self, event: &DealEvent) {
        match event.payload_json() {
            Ok(payload) => tracing::info!(
                target: "otcdesk::events",
                protocol = constants::PROTOCOL_NAME,
                version = constants::VERSION,
                event = event.name(),
                event_id = %event.id,
                block = event.block_height.0,
                payload = %payload,
                "deal event"
            ),
            Err(err) => tracing::warn!(
                target: "otcdesk::events",
                protocol = constants::PROTOCOL_NAME,
                version = constants::VERSION,
                event = event.name(),
                event_id = %event.id,
                error = %err,
                "deal event payload could not be encoded"
            ),
        }
    }
}

/// Fan out to two notifiers, first `A` then `B`.
impl<A: EventNotifier, B: EventNotifier> EventNotifier for (A, B) {
    fn notify(&mut self, event: &DealEvent) {
        self.0.notify(event);
        self.1.notify(event);
    }
}
