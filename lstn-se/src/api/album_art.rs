//! Album art API handler
//!
//! Aggregation leaves `image_url` empty on every album bucket; the UI
//! decorates its top-albums list lazily through this lookup instead.

use axum::{extract::Query, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::services::lastfm_client::LastfmClient;
use crate::AppState;

/// GET /stats/album-art query parameters
#[derive(Debug, Deserialize)]
pub struct AlbumArtQuery {
    pub artist: String,
    pub album: String,
    /// Primary API credential, treated as opaque
    pub api_key: String,
}

/// GET /stats/album-art response
#[derive(Debug, Serialize)]
pub struct AlbumArtResponse {
    /// Large-size image URL, absent when the API has none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// GET /stats/album-art
pub async fn get_album_art(
    Query(query): Query<AlbumArtQuery>,
) -> ApiResult<Json<AlbumArtResponse>> {
    if query.album.trim().is_empty() {
        return Err(ApiError::BadRequest("album must not be empty".to_string()));
    }

    let client =
        LastfmClient::new(query.api_key).map_err(|e| ApiError::Internal(e.to_string()))?;
    let image_url = client
        .album_art(&query.artist, &query.album)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    Ok(Json(AlbumArtResponse { image_url }))
}

/// Build album-art routes
pub fn album_art_routes() -> Router<AppState> {
    Router::new().route("/stats/album-art", get(get_album_art))
}
