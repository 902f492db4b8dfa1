//! Event types and EventBus for the Verdant discovery pipeline
//!
//! Provides shared event definitions broadcast by the venue discovery
//! service and consumed by SSE clients (admin dashboard).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted by the discovery/review pipeline.
///
/// Events are broadcast via [`EventBus`] and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VenueEvent {
    /// A new discovered venue was stored by the ingest pipeline
    VenueDiscovered {
        venue_id: Uuid,
        name: String,
        country: String,
        confidence_score: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An incoming candidate was merged into an existing discovered venue
    VenueMerged {
        venue_id: Uuid,
        platform: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A candidate was linked as a sibling location of a known chain
    ChainSiblingLinked {
        venue_id: Uuid,
        chain_id: Uuid,
        chain_name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A reviewer verified a discovered venue
    VenueVerified {
        venue_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A reviewer rejected a discovered venue
    VenueRejected {
        venue_id: Uuid,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A verified venue was materialized into the production store
    VenuePromoted {
        venue_id: Uuid,
        production_venue_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The staleness sweep marked discovered venues as stale
    VenuesMarkedStale {
        count: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl VenueEvent {
    /// Event type name used as the SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            VenueEvent::VenueDiscovered { .. } => "VenueDiscovered",
            VenueEvent::VenueMerged { .. } => "VenueMerged",
            VenueEvent::ChainSiblingLinked { .. } => "ChainSiblingLinked",
            VenueEvent::VenueVerified { .. } => "VenueVerified",
            VenueEvent::VenueRejected { .. } => "VenueRejected",
            VenueEvent::VenuePromoted { .. } => "VenuePromoted",
            VenueEvent::VenuesMarkedStale { .. } => "VenuesMarkedStale",
        }
    }
}

/// Central event distribution bus for application-wide events
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VenueEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity.
    ///
    /// Recommended values: 1000 for deployment, 10-100 for testing.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events.
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<VenueEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: VenueEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<VenueEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening.
    ///
    /// Used for notification events where it's acceptable if no admin
    /// client is currently connected.
    pub fn emit_lossy(&self, event: VenueEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let venue_id = Uuid::new_v4();
        bus.emit(VenueEvent::VenueVerified {
            venue_id,
            timestamp: chrono::Utc::now(),
        })
        .expect("at least one subscriber");

        match rx.recv().await.unwrap() {
            VenueEvent::VenueVerified { venue_id: id, .. } => assert_eq!(id, venue_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn emit_lossy_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit_lossy(VenueEvent::VenuesMarkedStale {
            count: 3,
            timestamp: chrono::Utc::now(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn event_type_names_are_stable() {
        let event = VenueEvent::VenueDiscovered {
            venue_id: Uuid::new_v4(),
            name: "Tibits".to_string(),
            country: "CH".to_string(),
            confidence_score: 72,
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(event.event_type(), "VenueDiscovered");
    }
}
