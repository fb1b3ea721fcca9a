//! Event types and EventBus for the LSTN event system

use crate::models::StatsSnapshot;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Aggregation phase for progress reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    /// Downloading listening-history pages
    Fetching,
    /// Resolving durations and folding scrobbles
    Processing,
}

impl std::fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressPhase::Fetching => write!(f, "fetching"),
            ProgressPhase::Processing => write!(f, "processing"),
        }
    }
}

/// Progress counter pair emitted by the aggregation pipeline
///
/// `(current, total)` is monotonically non-decreasing within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub phase: ProgressPhase,
    pub current: usize,
    pub total: usize,
}

/// LSTN event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StatsEvent {
    /// Aggregation run accepted and started
    RunStarted {
        run_id: Uuid,
        username: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// History page fetched (fetch phase progress)
    FetchProgress {
        run_id: Uuid,
        current: usize,
        total: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Scrobble folded or routed to unmatched (processing phase progress)
    ProcessProgress {
        run_id: Uuid,
        current: usize,
        total: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Intermediate snapshot for live-updating UIs
    ///
    /// Emitted in processing order; each snapshot is at least as complete as
    /// the previous one.
    PartialResult {
        run_id: Uuid,
        stats: StatsSnapshot,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run finished with a final snapshot
    RunCompleted {
        run_id: Uuid,
        stats: StatsSnapshot,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run aborted (history fetch failed)
    RunFailed {
        run_id: Uuid,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A manual duration match was applied to the current snapshot
    ManualMatchApplied {
        run_id: Uuid,
        artist: String,
        track: String,
        minutes: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Duration cache cleared by user action
    CacheCleared {
        entries_removed: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl StatsEvent {
    /// Get event type as string for SSE event naming and filtering
    pub fn event_type(&self) -> &str {
        match self {
            StatsEvent::RunStarted { .. } => "RunStarted",
            StatsEvent::FetchProgress { .. } => "FetchProgress",
            StatsEvent::ProcessProgress { .. } => "ProcessProgress",
            StatsEvent::PartialResult { .. } => "PartialResult",
            StatsEvent::RunCompleted { .. } => "RunCompleted",
            StatsEvent::RunFailed { .. } => "RunFailed",
            StatsEvent::ManualMatchApplied { .. } => "ManualMatchApplied",
            StatsEvent::CacheCleared { .. } => "CacheCleared",
        }
    }
}

/// Central event distribution bus
///
/// Backed by tokio::broadcast, providing non-blocking publish, multiple
/// concurrent subscribers, and automatic cleanup when subscribers drop.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StatsEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Older events are dropped for lagging subscribers once the buffer
    /// fills; 100 is plenty for a single-user service.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<StatsEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Progress and partial-result events are advisory; it is acceptable for
    /// no UI to be connected while a run executes.
    pub fn emit_lossy(&self, event: StatsEvent) {
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
