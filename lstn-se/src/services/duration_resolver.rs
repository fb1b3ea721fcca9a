//! Per-track duration resolution
//!
//! Fallback chain: duration cache, then the primary listening API, then
//! MusicBrainz. A miss is not an error; the caller routes unresolved
//! scrobbles to the unmatched list and the run continues.

use crate::cache::DurationCache;
use crate::services::lastfm_client::LastfmClient;
use crate::services::musicbrainz_client::MusicBrainzClient;
use async_trait::async_trait;
use lstn_common::models::{Scrobble, TrackKey};
use std::sync::Arc;
use tracing::{debug, warn};

/// Duration lookup seam for the aggregation pipeline
///
/// The pipeline partitions and resolves through this trait so tests can
/// substitute a double for the network-backed chain.
#[async_trait]
pub trait ResolveDuration: Send + Sync {
    /// Cache-only lookup; never touches the network
    fn cached(&self, key: &TrackKey) -> Option<f64>;

    /// Full fallback chain; None means the scrobble is unmatched
    async fn resolve(&self, scrobble: &Scrobble) -> Option<f64>;
}

/// Production resolver: cache -> primary API -> MusicBrainz
///
/// Durations recovered from either network source are written through to
/// the cache, so a re-run over the same history is a pure cache hit.
pub struct DurationResolver {
    lastfm: Arc<LastfmClient>,
    musicbrainz: Arc<MusicBrainzClient>,
    cache: Arc<DurationCache>,
}

impl DurationResolver {
    pub fn new(
        lastfm: Arc<LastfmClient>,
        musicbrainz: Arc<MusicBrainzClient>,
        cache: Arc<DurationCache>,
    ) -> Self {
        Self {
            lastfm,
            musicbrainz,
            cache,
        }
    }
}

#[async_trait]
impl ResolveDuration for DurationResolver {
    fn cached(&self, key: &TrackKey) -> Option<f64> {
        self.cache.get(key)
    }

    async fn resolve(&self, scrobble: &Scrobble) -> Option<f64> {
        let key = scrobble.key();

        // A cache hit returns without any network call
        if let Some(minutes) = self.cache.get(&key) {
            return Some(minutes);
        }

        debug!(
            artist = %scrobble.artist,
            track = %scrobble.track,
            "No cached duration, querying primary API"
        );

        match self
            .lastfm
            .track_duration(&scrobble.artist, &scrobble.track)
            .await
        {
            Ok(Some(minutes)) => {
                self.cache.set(key, minutes);
                return Some(minutes);
            }
            // A "0" or missing duration is non-authoritative; fall through
            Ok(None) => {}
            Err(e) => {
                warn!(
                    artist = %scrobble.artist,
                    track = %scrobble.track,
                    error = %e,
                    "Primary duration lookup failed, falling back to MusicBrainz"
                );
            }
        }

        let candidates = self
            .musicbrainz
            .search(
                &scrobble.artist,
                &scrobble.track,
                scrobble.mbid.as_deref(),
                scrobble.artist_mbid.as_deref(),
            )
            .await;

        // Only the first candidate counts, and only with a positive length
        if let Some(minutes) = candidates.first().and_then(|candidate| candidate.minutes()) {
            self.cache.set(key, minutes);
            return Some(minutes);
        }

        None
    }
}
