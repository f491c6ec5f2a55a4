//! Engine event types and broadcast bus
//!
//! Events are broadcast to in-process subscribers (the SSE endpoint, tests).
//! Emission never blocks and never fails the emitting operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Engine event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OreEvent {
    /// Bulk job driver started processing targets
    JobStarted {
        job_id: Uuid,
        total_targets: usize,
        timestamp: DateTime<Utc>,
    },

    /// Bulk job counters flushed
    JobProgress {
        job_id: Uuid,
        processed_targets: u64,
        total_targets: u64,
        enriched_contacts: u64,
        error_count: u64,
        timestamp: DateTime<Utc>,
    },

    /// Bulk job reached `succeeded`
    JobCompleted {
        job_id: Uuid,
        processed_targets: u64,
        enriched_contacts: u64,
        error_count: u64,
        timestamp: DateTime<Utc>,
    },

    /// Bulk job driver failed
    JobFailed {
        job_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A deferred post-processing pass finished
    PostProcessingCompleted {
        job_id: Uuid,
        pass: String,
        updated_results: usize,
        timestamp: DateTime<Utc>,
    },

    /// A single-entity enrichment phase changed status
    PhaseChanged {
        owner_id: Uuid,
        phase: String,
        status: String,
        timestamp: DateTime<Utc>,
    },

    /// An ownership chain walk finished
    ChainResolved {
        root_name: String,
        jurisdiction: Option<String>,
        ubo_count: usize,
        total_api_calls: u32,
        from_cache: bool,
        timestamp: DateTime<Utc>,
    },
}

impl OreEvent {
    /// Event type name (used as SSE event name)
    pub fn event_type(&self) -> &'static str {
        match self {
            OreEvent::JobStarted { .. } => "JobStarted",
            OreEvent::JobProgress { .. } => "JobProgress",
            OreEvent::JobCompleted { .. } => "JobCompleted",
            OreEvent::JobFailed { .. } => "JobFailed",
            OreEvent::PostProcessingCompleted { .. } => "PostProcessingCompleted",
            OreEvent::PhaseChanged { .. } => "PhaseChanged",
            OreEvent::ChainResolved { .. } => "ChainResolved",
        }
    }
}

/// Broadcast event bus
///
/// Cloning the bus shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OreEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<OreEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: OreEvent) -> Result<usize, broadcast::error::SendError<OreEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: OreEvent) {
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
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let job_id = Uuid::new_v4();

        bus.emit(OreEvent::JobStarted {
            job_id,
            total_targets: 4,
            timestamp: Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            OreEvent::JobStarted { job_id: got, total_targets, .. } => {
                assert_eq!(got, job_id);
                assert_eq!(total_targets, 4);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        let event = OreEvent::JobFailed {
            job_id: Uuid::new_v4(),
            error: "boom".to_string(),
            timestamp: Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = OreEvent::PhaseChanged {
            owner_id: Uuid::new_v4(),
            phase: "summary".to_string(),
            status: "done".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PhaseChanged");
        assert_eq!(event.event_type(), "PhaseChanged");
    }
}
