//! Event types for the LSQ event system
//!
//! Provides shared event definitions and the EventBus used by the queue
//! manager and the sub-track tracker.

mod playback_types;
mod queue_types;

pub use playback_types::{PlaybackState, TransitionReason};
pub use queue_types::QueueChangeTrigger;

use crate::models::{CatalogId, SubTrack};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// LSQ event types
///
/// Events are broadcast via EventBus and are serializable so an outer layer
/// can forward them to a UI without another mapping step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    /// Effective order or current index changed
    QueueChanged {
        /// Why the queue changed
        trigger: QueueChangeTrigger,
        /// Instance ids in effective order
        effective: Vec<Uuid>,
        /// Index of the current entry within `effective`
        current_index: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The tracked liveset changed (None when tracking was cleared)
    LivesetChanged {
        catalog_id: Option<CatalogId>,
        title: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Current sub-track within the liveset changed
    ///
    /// `track` is None inside the untitled leading section.
    SubTrackChanged {
        liveset_id: CatalogId,
        track: Option<SubTrack>,
        /// Position that triggered the change (milliseconds)
        position_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Previous/next sub-track availability changed
    PrevNextAvailabilityChanged {
        has_prev: bool,
        has_next: bool,
    },

    /// Periodic position report while playing
    PlaybackProgress {
        position_ms: Option<u64>,
        duration_ms: Option<u64>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use lsq_common::events::{EventBus, QueueEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(QueueEvent::PrevNextAvailabilityChanged {
///     has_prev: false,
///     has_next: true,
/// });
///
/// assert!(matches!(
///     rx.try_recv(),
///     Ok(QueueEvent::PrevNextAvailabilityChanged { has_next: true, .. })
/// ));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<QueueEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: QueueEvent,
    ) -> Result<usize, broadcast::error::SendError<QueueEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: QueueEvent) {
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

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        let result = bus.emit(QueueEvent::PrevNextAvailabilityChanged {
            has_prev: true,
            has_next: false,
        });
        assert!(result.is_err());
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 10);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let delivered = bus
            .emit(QueueEvent::LivesetChanged {
                catalog_id: Some(7),
                title: Some("Sunrise set".to_string()),
                timestamp: chrono::Utc::now(),
            })
            .unwrap();
        assert_eq!(delivered, 2);

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                QueueEvent::LivesetChanged { catalog_id, .. } => assert_eq!(catalog_id, Some(7)),
                other => panic!("Unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = QueueEvent::QueueChanged {
            trigger: QueueChangeTrigger::UserEnqueue,
            effective: vec![Uuid::nil()],
            current_index: 0,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "QueueChanged");
        assert_eq!(json["trigger"], "UserEnqueue");
    }

    #[test]
    fn test_trigger_display() {
        assert_eq!(QueueChangeTrigger::PlayerTransition.to_string(), "PlayerTransition");
        assert_eq!(TransitionReason::PlaylistChanged.to_string(), "PlaylistChanged");
        assert_eq!(PlaybackState::Ended.to_string(), "Ended");
    }
}
