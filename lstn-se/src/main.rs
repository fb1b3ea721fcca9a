//! lstn-se - Listening Stats Engine service
//!
//! Aggregates a Last.fm user's scrobble history into multi-dimensional
//! listening statistics. Track durations resolve through a persistent cache
//! with a rate-limited MusicBrainz fallback; progress and partial results
//! stream to the web UI via HTTP REST + SSE.

use anyhow::Result;
use lstn_common::events::EventBus;
use lstn_se::cache::DurationCache;
use lstn_se::config::ServiceConfig;
use lstn_se::services::musicbrainz_client::MusicBrainzClient;
use lstn_se::AppState;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting lstn-se (Listening Stats Engine)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::resolve()?;

    if let Some(parent) = config.cache_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!("Duration cache: {}", config.cache_path.display());
    let cache = Arc::new(DurationCache::new(config.cache_path.clone()));

    let musicbrainz = Arc::new(
        MusicBrainzClient::with_min_interval(config.musicbrainz_interval_ms)
            .map_err(|e| anyhow::anyhow!("Failed to create MusicBrainz client: {}", e))?,
    );

    let event_bus = EventBus::new(100);
    info!("Event bus initialized");

    let state = AppState::new(event_bus, cache, musicbrainz);
    let app = lstn_se::build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", config.port)).await?;
    info!("Listening on http://127.0.0.1:{}", config.port);
    info!("Health check: http://127.0.0.1:{}/health", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
