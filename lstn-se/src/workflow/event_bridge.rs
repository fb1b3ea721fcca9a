//! Pipeline observation bridge for SSE broadcasting
//!
//! The pipeline reports through plain mpsc channels and knows nothing about
//! runs or the EventBus. These bridge tasks tag what comes out of those
//! channels with the owning run id and re-emit it as `StatsEvent`s for
//! connected SSE clients.

use lstn_common::events::{EventBus, ProgressPhase, ProgressUpdate, StatsEvent};
use lstn_common::models::StatsSnapshot;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Bridge task forwarding progress updates to the EventBus
pub async fn bridge_progress_events(
    mut progress_rx: mpsc::Receiver<ProgressUpdate>,
    event_bus: EventBus,
    run_id: Uuid,
) {
    debug!(run_id = %run_id, "Progress event bridge started");

    while let Some(update) = progress_rx.recv().await {
        let timestamp = lstn_common::time::now();
        let event = match update.phase {
            ProgressPhase::Fetching => StatsEvent::FetchProgress {
                run_id,
                current: update.current,
                total: update.total,
                timestamp,
            },
            ProgressPhase::Processing => StatsEvent::ProcessProgress {
                run_id,
                current: update.current,
                total: update.total,
                timestamp,
            },
        };
        event_bus.emit_lossy(event);
    }

    debug!(run_id = %run_id, "Progress event bridge completed");
}

/// Bridge task forwarding partial snapshots to the EventBus
pub async fn bridge_partial_results(
    mut partial_rx: mpsc::Receiver<StatsSnapshot>,
    event_bus: EventBus,
    run_id: Uuid,
) {
    debug!(run_id = %run_id, "Partial-result bridge started");

    while let Some(stats) = partial_rx.recv().await {
        event_bus.emit_lossy(StatsEvent::PartialResult {
            run_id,
            stats,
            timestamp: lstn_common::time::now(),
        });
    }

    debug!(run_id = %run_id, "Partial-result bridge completed");
}
