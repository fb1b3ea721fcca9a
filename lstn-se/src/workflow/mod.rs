//! Aggregation workflow for one stats run
//!
//! The pipeline fetches the listening history, folds cache-resolvable
//! scrobbles first, then resolves the rest one at a time through the
//! duration fallback chain:
//! 1. Fetch every history page in range (fatal on any page failure)
//! 2. Partition scrobbles against the cache (no network)
//! 3. Fold the cached partition (fast path, pure accumulation)
//! 4. Resolve and fold the uncached partition sequentially; unresolvable
//!    scrobbles land in the unmatched list and the run continues
//!
//! Progress and partial snapshots flow out through two optional mpsc
//! channels; the event bridge forwards them onto the EventBus for SSE.

pub mod event_bridge;
pub mod pipeline;

pub use pipeline::{PipelineError, StatsPipeline};
