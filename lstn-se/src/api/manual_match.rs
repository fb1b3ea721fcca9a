//! Manual match API handlers
//!
//! Repairs unmatched tracks: GET /stats/candidates searches MusicBrainz for
//! a user-edited (artist, track) pair; POST /stats/match writes the chosen
//! or hand-entered duration into the cache and folds it into the current
//! snapshot.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use lstn_common::events::StatsEvent;
use lstn_common::models::{Scrobble, StatsSnapshot};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::services::musicbrainz_client::RecordingCandidate;
use crate::stats::apply_manual_match;
use crate::{AppState, RunState};

/// GET /stats/candidates query parameters
#[derive(Debug, Deserialize)]
pub struct CandidatesQuery {
    pub artist: String,
    pub track: String,
}

/// GET /stats/candidates response
#[derive(Debug, Serialize)]
pub struct CandidatesResponse {
    pub candidates: Vec<RecordingCandidate>,
}

/// POST /stats/match request
#[derive(Debug, Deserialize)]
pub struct ManualMatchRequest {
    pub scrobble: Scrobble,
    /// User-chosen duration in minutes
    pub minutes: f64,
}

/// POST /stats/match response
#[derive(Debug, Serialize)]
pub struct ManualMatchResponse {
    pub stats: StatsSnapshot,
    pub cached_durations: usize,
}

/// GET /stats/candidates
///
/// Candidate recordings for the manual-match picker. The user may have
/// edited the pair, so this always uses the free-text query shape. An empty
/// list is a normal outcome.
pub async fn get_candidates(
    State(state): State<AppState>,
    Query(query): Query<CandidatesQuery>,
) -> ApiResult<Json<CandidatesResponse>> {
    if query.track.trim().is_empty() {
        return Err(ApiError::BadRequest("track must not be empty".to_string()));
    }

    let candidates = state
        .musicbrainz
        .search(&query.artist, &query.track, None, None)
        .await;

    Ok(Json(CandidatesResponse { candidates }))
}

/// POST /stats/match
///
/// Apply a manual duration to the completed snapshot. The cache write comes
/// first so a later full re-run resolves this pair without a network call;
/// the snapshot update then removes every unmatched instance of the pair
/// and folds in one duration's worth of minutes.
pub async fn apply_match(
    State(state): State<AppState>,
    Json(request): Json<ManualMatchRequest>,
) -> ApiResult<Json<ManualMatchResponse>> {
    if !(request.minutes > 0.0) {
        return Err(ApiError::BadRequest(
            "minutes must be a positive number".to_string(),
        ));
    }

    let mut current = state.current_run.write().await;
    let run = current
        .as_mut()
        .ok_or_else(|| ApiError::Conflict("No aggregation run has been started".to_string()))?;
    if run.state != RunState::Completed {
        return Err(ApiError::Conflict(
            "Manual matching requires a completed run".to_string(),
        ));
    }
    let stats = run
        .stats
        .as_ref()
        .ok_or_else(|| ApiError::Internal("Completed run is missing its snapshot".to_string()))?;

    state.cache.set(request.scrobble.key(), request.minutes);
    let updated = apply_manual_match(stats, &request.scrobble, request.minutes);
    run.stats = Some(updated.clone());

    state.event_bus.emit_lossy(StatsEvent::ManualMatchApplied {
        run_id: run.run_id,
        artist: request.scrobble.artist.clone(),
        track: request.scrobble.track.clone(),
        minutes: request.minutes,
        timestamp: chrono::Utc::now(),
    });
    tracing::info!(
        run_id = %run.run_id,
        artist = %request.scrobble.artist,
        track = %request.scrobble.track,
        minutes = request.minutes,
        "Manual match applied"
    );

    Ok(Json(ManualMatchResponse {
        stats: updated,
        cached_durations: state.cache.count(),
    }))
}

/// Build manual-match routes
pub fn match_routes() -> Router<AppState> {
    Router::new()
        .route("/stats/candidates", get(get_candidates))
        .route("/stats/match", post(apply_match))
}
