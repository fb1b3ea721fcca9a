//! Duration-cache inspection and clearing

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use lstn_common::events::StatsEvent;
use serde::Serialize;

use crate::AppState;

/// GET /cache response
#[derive(Debug, Serialize)]
pub struct CacheStatusResponse {
    /// Number of cached track durations
    pub entries: usize,
}

/// POST /cache/clear response
#[derive(Debug, Serialize)]
pub struct CacheClearResponse {
    pub entries_removed: usize,
}

/// GET /cache
pub async fn cache_status(State(state): State<AppState>) -> Json<CacheStatusResponse> {
    Json(CacheStatusResponse {
        entries: state.cache.count(),
    })
}

/// POST /cache/clear
///
/// Wholesale clear; cached durations otherwise never expire.
pub async fn clear_cache(State(state): State<AppState>) -> Json<CacheClearResponse> {
    let entries_removed = state.cache.count();
    state.cache.clear();

    state.event_bus.emit_lossy(StatsEvent::CacheCleared {
        entries_removed,
        timestamp: chrono::Utc::now(),
    });
    tracing::info!(entries_removed, "Duration cache cleared");

    Json(CacheClearResponse { entries_removed })
}

/// Build cache routes
pub fn cache_routes() -> Router<AppState> {
    Router::new()
        .route("/cache", get(cache_status))
        .route("/cache/clear", post(clear_cache))
}
