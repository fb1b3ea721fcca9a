//! Aggregation pipeline orchestrator

use crate::services::duration_resolver::ResolveDuration;
use crate::services::lastfm_client::{LastfmClient, LastfmError};
use crate::stats::StatsBuilder;
use lstn_common::events::{ProgressPhase, ProgressUpdate};
use lstn_common::models::{Scrobble, StatsSnapshot};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Snapshot emission cadence during the uncached-resolution phase
const PARTIAL_RESULT_EVERY: usize = 10;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// History fetch failed; the whole run is aborted
    #[error("History fetch failed: {0}")]
    Fetch(#[from] LastfmError),
}

/// Aggregation pipeline for one stats run
///
/// Strictly sequential: at most one outbound request is in flight at any
/// moment, which is the whole of the rate courtesy toward the primary API.
pub struct StatsPipeline {
    lastfm: Arc<LastfmClient>,
    resolver: Arc<dyn ResolveDuration>,
    progress_tx: Option<mpsc::Sender<ProgressUpdate>>,
    partial_tx: Option<mpsc::Sender<StatsSnapshot>>,
}

impl StatsPipeline {
    /// Pipeline without observers
    pub fn new(lastfm: Arc<LastfmClient>, resolver: Arc<dyn ResolveDuration>) -> Self {
        Self {
            lastfm,
            resolver,
            progress_tx: None,
            partial_tx: None,
        }
    }

    /// Pipeline with progress and partial-snapshot observation channels
    pub fn with_observers(
        lastfm: Arc<LastfmClient>,
        resolver: Arc<dyn ResolveDuration>,
        progress_tx: mpsc::Sender<ProgressUpdate>,
        partial_tx: mpsc::Sender<StatsSnapshot>,
    ) -> Self {
        Self {
            lastfm,
            resolver,
            progress_tx: Some(progress_tx),
            partial_tx: Some(partial_tx),
        }
    }

    /// Run the full aggregation pass over the inclusive [from, to] range
    pub async fn run(
        &self,
        user: &str,
        from: i64,
        to: i64,
    ) -> Result<StatsSnapshot, PipelineError> {
        let scrobbles = self.fetch_history(user, from, to).await?;
        info!(count = scrobbles.len(), user = %user, "History fetch complete");
        Ok(self.aggregate(scrobbles).await)
    }

    /// Fetch every completed scrobble in range, page order preserved
    ///
    /// Page 1 establishes the page count; the rest follow sequentially. Any
    /// page failure aborts the fetch with no partial result, since the
    /// aggregate has no way to resume a partial history.
    async fn fetch_history(
        &self,
        user: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<Scrobble>, PipelineError> {
        let first = self.lastfm.recent_tracks_page(user, from, to, 1).await?;
        let total_pages = first.total_pages;
        let mut scrobbles = first.scrobbles;
        self.emit_progress(ProgressPhase::Fetching, 1, total_pages.max(1) as usize)
            .await;

        for page in 2..=total_pages {
            let next = self.lastfm.recent_tracks_page(user, from, to, page).await?;
            scrobbles.extend(next.scrobbles);
            self.emit_progress(ProgressPhase::Fetching, page as usize, total_pages as usize)
                .await;
        }

        Ok(scrobbles)
    }

    /// Aggregate an already-fetched scrobble list
    ///
    /// Split out from `run` so the fold can be driven without a live
    /// history API.
    pub async fn aggregate(&self, scrobbles: Vec<Scrobble>) -> StatsSnapshot {
        let mut builder = StatsBuilder::for_scrobbles(&scrobbles);
        let total = scrobbles.len();

        // Cache pre-check partition: no network calls here
        let mut cached = Vec::new();
        let mut uncached = Vec::new();
        for scrobble in scrobbles {
            match self.resolver.cached(&scrobble.key()) {
                Some(minutes) => cached.push((scrobble, minutes)),
                None => uncached.push(scrobble),
            }
        }
        info!(
            cached = cached.len(),
            uncached = uncached.len(),
            "Partitioned scrobbles against the duration cache"
        );

        // Fast path first, so a large partial result is available before
        // any network-bound resolution begins
        let mut processed = 0;
        for (scrobble, minutes) in &cached {
            builder.fold(scrobble, *minutes);
            processed += 1;
            self.emit_progress(ProgressPhase::Processing, processed, total)
                .await;
        }
        if !cached.is_empty() {
            self.emit_partial(builder.snapshot()).await;
        }

        let uncached_total = uncached.len();
        for (index, scrobble) in uncached.into_iter().enumerate() {
            match self.resolver.resolve(&scrobble).await {
                Some(minutes) => builder.fold(&scrobble, minutes),
                None => {
                    debug!(
                        artist = %scrobble.artist,
                        track = %scrobble.track,
                        "No duration resolved, routing to unmatched"
                    );
                    builder.push_unmatched(scrobble);
                }
            }
            processed += 1;
            self.emit_progress(ProgressPhase::Processing, processed, total)
                .await;

            if (index + 1) % PARTIAL_RESULT_EVERY == 0 || index + 1 == uncached_total {
                self.emit_partial(builder.snapshot()).await;
            }
        }

        builder.snapshot()
    }

    async fn emit_progress(&self, phase: ProgressPhase, current: usize, total: usize) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx
                .send(ProgressUpdate {
                    phase,
                    current,
                    total,
                })
                .await;
        }
    }

    async fn emit_partial(&self, snapshot: StatsSnapshot) {
        if let Some(tx) = &self.partial_tx {
            let _ = tx.send(snapshot).await;
        }
    }
}
