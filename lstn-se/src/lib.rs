//! lstn-se library interface
//!
//! Exposes the stats-engine internals for integration testing.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod services;
pub mod stats;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use crate::cache::DurationCache;
use crate::services::musicbrainz_client::MusicBrainzClient;
use axum::Router;
use chrono::{DateTime, Utc};
use lstn_common::events::EventBus;
use lstn_common::models::StatsSnapshot;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// State of the most recent aggregation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Completed,
    Failed,
}

/// Book-keeping for the current (latest) aggregation run
///
/// Starting a new run replaces this wholesale; a superseded run discovers it
/// has been replaced when its id no longer matches and discards its result.
#[derive(Debug, Clone)]
pub struct CurrentRun {
    pub run_id: Uuid,
    pub username: String,
    pub state: RunState,
    pub stats: Option<StatsSnapshot>,
    pub error: Option<String>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Persistent track-duration cache
    pub cache: Arc<DurationCache>,
    /// Process-wide MusicBrainz client; one instance keeps the rate limit
    /// global across every caller
    pub musicbrainz: Arc<MusicBrainzClient>,
    /// Latest aggregation run, if any
    pub current_run: Arc<RwLock<Option<CurrentRun>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        event_bus: EventBus,
        cache: Arc<DurationCache>,
        musicbrainz: Arc<MusicBrainzClient>,
    ) -> Self {
        Self {
            event_bus,
            cache,
            musicbrainz,
            current_run: Arc::new(RwLock::new(None)),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::stats_routes())
        .merge(api::match_routes())
        .merge(api::album_art_routes())
        .merge(api::cache_routes())
        .merge(api::health_routes())
        .route("/stats/events", get(api::stats_event_stream))
        .with_state(state)
}
