//! Batch progress events and the broadcast event bus
//!
//! Events are broadcast via [`EventBus`] and serialized for SSE transmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Pipeline phase of a batch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Directory fetch, blocking, scoring and classification
    Matching,
    /// External assessment of matched pairs
    Assessment,
}

impl MatchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchPhase::Matching => "matching",
            MatchPhase::Assessment => "assessment",
        }
    }
}

/// Batch job events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MatchEvent {
    /// A batch job was accepted and validated
    BatchStarted {
        job_id: Uuid,
        total_customers: usize,
        total_shells: usize,
        timestamp: DateTime<Utc>,
    },

    /// Progress counter update for one phase
    PhaseProgress {
        job_id: Uuid,
        phase: MatchPhase,
        completed: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// A batch job produced its full result set
    BatchCompleted {
        job_id: Uuid,
        total_customers: usize,
        matched: usize,
        unmatched: usize,
        flagged: usize,
        invalid: usize,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A batch job was cancelled; it still returns a full result set
    BatchCancelled {
        job_id: Uuid,
        assessments_completed: usize,
        assessments_total: usize,
        timestamp: DateTime<Utc>,
    },
}

impl MatchEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            MatchEvent::BatchStarted { .. } => "BatchStarted",
            MatchEvent::PhaseProgress { .. } => "PhaseProgress",
            MatchEvent::BatchCompleted { .. } => "BatchCompleted",
            MatchEvent::BatchCancelled { .. } => "BatchCancelled",
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            MatchEvent::BatchStarted { job_id, .. }
            | MatchEvent::PhaseProgress { job_id, .. }
            | MatchEvent::BatchCompleted { job_id, .. }
            | MatchEvent::BatchCancelled { job_id, .. } => *job_id,
        }
    }
}

/// Broadcast bus for [`MatchEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MatchEvent>,
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
    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.tx.subscribe()
    }

    /// Emit an event
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: MatchEvent,
    ) -> Result<usize, broadcast::error::SendError<MatchEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: MatchEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(job_id: Uuid, completed: usize) -> MatchEvent {
        MatchEvent::PhaseProgress {
            job_id,
            phase: MatchPhase::Assessment,
            completed,
            total: 10,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(8);
        assert!(bus.emit(progress(Uuid::new_v4(), 1)).is_err());
        // lossy variant never panics
        bus.emit_lossy(progress(Uuid::new_v4(), 2));
        assert_eq!(bus.capacity(), 8);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let job_id = Uuid::new_v4();

        assert_eq!(bus.emit(progress(job_id, 1)).unwrap(), 1);
        bus.emit_lossy(progress(job_id, 2));

        for expected in 1..=2 {
            match rx.recv().await.unwrap() {
                MatchEvent::PhaseProgress { completed, job_id: id, .. } => {
                    assert_eq!(completed, expected);
                    assert_eq!(id, job_id);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let job_id = Uuid::new_v4();
        let json = serde_json::to_value(progress(job_id, 3)).unwrap();
        assert_eq!(json["type"], "PhaseProgress");
        assert_eq!(json["phase"], "assessment");
        assert_eq!(json["completed"], 3);
        assert_eq!(progress(job_id, 3).event_type(), "PhaseProgress");
        assert_eq!(progress(job_id, 3).job_id(), job_id);
    }
}
