//! Event types for the FallGuard event system
//!
//! Provides the shared event definitions and the EventBus used to fan
//! coordinator activity out to SSE clients and log consumers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Identity assigned to an entity by the external tracker
pub type TrackId = i64;

/// Why a pending confirmation left the slot without a human decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawReason {
    /// Entity was reclassified as not fallen
    Recovered,
    /// Entity was absent from the frame
    Lost,
}

/// Delivery channel of a notification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationChannel {
    /// Text alert sent to the alert recipient
    Message,
    /// Voice call placed to the caregiver at the rotation pointer
    Call,
}

/// Result of one notification attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Provider accepted the request
    Delivered {
        recipient: String,
        /// Provider receipt (message or call SID)
        receipt: String,
    },
    /// Provider call failed
    Failed { recipient: String, error: String },
    /// Attempt not made (configuration error)
    Skipped { reason: String },
}

impl DeliveryOutcome {
    /// True if the provider accepted the request
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    /// Recipient the attempt was addressed to, if any
    pub fn recipient(&self) -> Option<&str> {
        match self {
            DeliveryOutcome::Delivered { recipient, .. }
            | DeliveryOutcome::Failed { recipient, .. } => Some(recipient),
            DeliveryOutcome::Skipped { .. } => None,
        }
    }
}

/// FallGuard event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FallguardEvent {
    /// An entity entered the pending confirmation slot
    ///
    /// Triggers:
    /// - SSE: Show Yes/No prompt and play the operator chime
    ConfirmationRequested {
        track_id: TrackId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The pending entity left the slot without a decision
    ConfirmationWithdrawn {
        track_id: TrackId,
        reason: WithdrawReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Operator confirmed the fall; notifications are queued
    IncidentConfirmed {
        incident_id: Uuid,
        track_id: TrackId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Operator denied the fall
    IncidentDenied {
        track_id: TrackId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A message or call attempt finished
    NotificationAttempted {
        incident_id: Uuid,
        track_id: TrackId,
        channel: NotificationChannel,
        outcome: DeliveryOutcome,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl FallguardEvent {
    /// Variant name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            FallguardEvent::ConfirmationRequested { .. } => "ConfirmationRequested",
            FallguardEvent::ConfirmationWithdrawn { .. } => "ConfirmationWithdrawn",
            FallguardEvent::IncidentConfirmed { .. } => "IncidentConfirmed",
            FallguardEvent::IncidentDenied { .. } => "IncidentDenied",
            FallguardEvent::NotificationAttempted { .. } => "NotificationAttempted",
        }
    }

    /// Track id the event refers to
    pub fn track_id(&self) -> TrackId {
        match self {
            FallguardEvent::ConfirmationRequested { track_id, .. }
            | FallguardEvent::ConfirmationWithdrawn { track_id, .. }
            | FallguardEvent::IncidentConfirmed { track_id, .. }
            | FallguardEvent::IncidentDenied { track_id, .. }
            | FallguardEvent::NotificationAttempted { track_id, .. } => *track_id,
        }
    }
}

/// Broadcast bus for FallguardEvent
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FallguardEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before the
    /// oldest are dropped for lagging receivers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<FallguardEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: FallguardEvent) {
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

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = FallguardEvent::ConfirmationWithdrawn {
            track_id: 7,
            reason: WithdrawReason::Lost,
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ConfirmationWithdrawn");
        assert_eq!(json["track_id"], 7);
        assert_eq!(json["reason"], "Lost");
        assert_eq!(event.event_type(), "ConfirmationWithdrawn");
    }

    #[test]
    fn test_delivery_outcome_tagging() {
        let outcome = DeliveryOutcome::Failed {
            recipient: "+15550000001".to_string(),
            error: "timeout".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(outcome.recipient(), Some("+15550000001"));
        assert!(!outcome.is_delivered());

        let skipped = DeliveryOutcome::Skipped {
            reason: "no caregivers".to_string(),
        };
        assert_eq!(skipped.recipient(), None);
    }

    #[tokio::test]
    async fn test_event_bus_delivers_to_subscribers() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit_lossy(FallguardEvent::IncidentDenied {
            track_id: 3,
            timestamp: chrono::Utc::now(),
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.track_id(), 3);
        assert_eq!(received.event_type(), "IncidentDenied");
    }

    #[test]
    fn test_emit_lossy_without_subscribers() {
        let bus = EventBus::new(4);
        bus.emit_lossy(FallguardEvent::ConfirmationRequested {
            track_id: 1,
            timestamp: chrono::Utc::now(),
        });
        assert_eq!(bus.capacity(), 4);
    }
}
