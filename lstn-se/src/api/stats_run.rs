//! Aggregation run API handlers
//!
//! POST /stats/run starts a background aggregation; GET /stats/current
//! reports the latest run and its snapshot once completed.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use lstn_common::events::StatsEvent;
use lstn_common::models::StatsSnapshot;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::services::duration_resolver::DurationResolver;
use crate::services::lastfm_client::LastfmClient;
use crate::workflow::event_bridge;
use crate::workflow::StatsPipeline;
use crate::{AppState, CurrentRun, RunState};

/// POST /stats/run request
#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    pub username: String,
    /// Primary API credential, treated as opaque
    pub api_key: String,
    /// Range start (unix seconds, inclusive)
    pub from: i64,
    /// Range end (unix seconds, inclusive)
    pub to: i64,
}

/// POST /stats/run response
#[derive(Debug, Serialize)]
pub struct StartRunResponse {
    pub run_id: Uuid,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
}

/// GET /stats/current response
#[derive(Debug, Serialize)]
pub struct CurrentRunResponse {
    pub run_id: Uuid,
    pub username: String,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /stats/run
///
/// Begin an aggregation run in the background. A new run supersedes any
/// run still in flight: the old run keeps executing but its result is
/// discarded when it reports back, and its events carry a stale run id
/// that clients drop.
pub async fn start_run(
    State(state): State<AppState>,
    Json(request): Json<StartRunRequest>,
) -> ApiResult<Json<StartRunResponse>> {
    if request.username.trim().is_empty() {
        return Err(ApiError::BadRequest("username must not be empty".to_string()));
    }
    if request.api_key.trim().is_empty() {
        return Err(ApiError::BadRequest("api_key must not be empty".to_string()));
    }
    if request.from > request.to {
        return Err(ApiError::BadRequest(format!(
            "from ({}) must not be after to ({})",
            request.from, request.to
        )));
    }

    let lastfm = Arc::new(
        LastfmClient::new(request.api_key).map_err(|e| ApiError::Internal(e.to_string()))?,
    );

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();

    {
        let mut current = state.current_run.write().await;
        if let Some(previous) = current.as_ref() {
            if previous.state == RunState::Running {
                tracing::info!(
                    superseded = %previous.run_id,
                    run_id = %run_id,
                    "New run supersedes an in-flight run"
                );
            }
        }
        *current = Some(CurrentRun {
            run_id,
            username: request.username.clone(),
            state: RunState::Running,
            stats: None,
            error: None,
        });
    }

    state.event_bus.emit_lossy(StatsEvent::RunStarted {
        run_id,
        username: request.username.clone(),
        timestamp: started_at,
    });

    // Observation channels, bridged onto the bus for SSE clients
    let (progress_tx, progress_rx) = mpsc::channel(64);
    let (partial_tx, partial_rx) = mpsc::channel(16);
    tokio::spawn(event_bridge::bridge_progress_events(
        progress_rx,
        state.event_bus.clone(),
        run_id,
    ));
    tokio::spawn(event_bridge::bridge_partial_results(
        partial_rx,
        state.event_bus.clone(),
        run_id,
    ));

    let resolver = Arc::new(DurationResolver::new(
        lastfm.clone(),
        state.musicbrainz.clone(),
        state.cache.clone(),
    ));
    let pipeline = StatsPipeline::with_observers(lastfm, resolver, progress_tx, partial_tx);

    let state_clone = state.clone();
    let username = request.username;
    let (from, to) = (request.from, request.to);
    tokio::spawn(async move {
        tracing::info!(run_id = %run_id, user = %username, "Aggregation run started");
        let result = pipeline.run(&username, from, to).await;
        let timestamp = Utc::now();

        let mut current = state_clone.current_run.write().await;
        let still_current = current
            .as_ref()
            .map(|run| run.run_id == run_id)
            .unwrap_or(false);
        if !still_current {
            tracing::info!(run_id = %run_id, "Run superseded, discarding result");
            return;
        }

        match result {
            Ok(stats) => {
                if let Some(run) = current.as_mut() {
                    run.state = RunState::Completed;
                    run.stats = Some(stats.clone());
                }
                state_clone.event_bus.emit_lossy(StatsEvent::RunCompleted {
                    run_id,
                    stats,
                    timestamp,
                });
                tracing::info!(run_id = %run_id, "Aggregation run completed");
            }
            Err(e) => {
                if let Some(run) = current.as_mut() {
                    run.state = RunState::Failed;
                    run.error = Some(e.to_string());
                }
                state_clone.event_bus.emit_lossy(StatsEvent::RunFailed {
                    run_id,
                    message: e.to_string(),
                    timestamp,
                });
                tracing::error!(run_id = %run_id, error = %e, "Aggregation run failed");
            }
        }
    });

    Ok(Json(StartRunResponse {
        run_id,
        state: RunState::Running,
        started_at,
    }))
}

/// GET /stats/current
///
/// Latest run state; includes the final snapshot once completed.
pub async fn get_current_run(State(state): State<AppState>) -> ApiResult<Json<CurrentRunResponse>> {
    let current = state.current_run.read().await;
    let run = current
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("No aggregation run has been started".to_string()))?;

    Ok(Json(CurrentRunResponse {
        run_id: run.run_id,
        username: run.username.clone(),
        state: run.state,
        stats: run.stats.clone(),
        error: run.error.clone(),
    }))
}

/// Build aggregation run routes
pub fn stats_routes() -> Router<AppState> {
    Router::new()
        .route("/stats/run", post(start_run))
        .route("/stats/current", get(get_current_run))
}
