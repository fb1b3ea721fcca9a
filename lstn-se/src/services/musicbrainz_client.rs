//! MusicBrainz API client
//!
//! Fallback duration lookups with the service-mandated 1 request/second
//! rate limit. One instance serves the whole process so the limit holds
//! across every caller.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

const MUSICBRAINZ_BASE_URL: &str = "https://musicbrainz.org/ws/2";
const USER_AGENT: &str = "lstn-se/0.1.0 (https://github.com/lstn-music/lstn)";
const RATE_LIMIT_MS: u64 = 1000; // 1 request per second

/// MusicBrainz client errors
#[derive(Debug, Error)]
pub enum MBError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Candidate recording returned by a search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingCandidate {
    /// Recording MBID
    pub id: String,
    /// Recording title
    pub title: String,
    /// Recording length in milliseconds, when MusicBrainz knows it
    pub length_ms: Option<u64>,
    pub artist: Option<String>,
    pub artist_mbid: Option<String>,
    pub album: Option<String>,
    pub album_mbid: Option<String>,
}

impl RecordingCandidate {
    /// Length in minutes, when present and strictly positive
    pub fn minutes(&self) -> Option<f64> {
        self.length_ms
            .filter(|millis| *millis > 0)
            .map(|millis| millis as f64 / 1000.0 / 60.0)
    }
}

// Wire types

#[derive(Debug, Deserialize)]
struct MBRecording {
    id: String,
    title: String,
    #[serde(default)]
    length: Option<u64>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Option<Vec<MBArtistCredit>>,
    #[serde(default)]
    releases: Option<Vec<MBRelease>>,
}

#[derive(Debug, Deserialize)]
struct MBArtistCredit {
    /// Display name (may differ from artist.name for collaborations)
    name: String,
    artist: MBArtist,
}

#[derive(Debug, Deserialize)]
struct MBArtist {
    id: String,
    #[allow(dead_code)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct MBRelease {
    id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct MBSearchResponse {
    #[serde(default)]
    recordings: Vec<MBRecording>,
}

/// Rate limiter enforcing 1 request/second
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl MusicBrainzClient {
    pub fn new() -> Result<Self, MBError> {
        Self::with_min_interval(RATE_LIMIT_MS)
    }

    /// Client with a custom limiter interval (tests shrink it)
    pub fn with_min_interval(min_interval_ms: u64) -> Result<Self, MBError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MBError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(min_interval_ms),
        })
    }

    /// Search candidate recordings for an (artist, track) pair
    ///
    /// Query shape prefers the track MBID, then the artist MBID, then a
    /// free-text query. Network, HTTP, and parse failures all degrade to an
    /// empty candidate list; a miss here is never fatal to a run.
    pub async fn search(
        &self,
        artist: &str,
        track: &str,
        track_mbid: Option<&str>,
        artist_mbid: Option<&str>,
    ) -> Vec<RecordingCandidate> {
        match self.try_search(artist, track, track_mbid, artist_mbid).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(
                    artist = %artist,
                    track = %track,
                    error = %e,
                    "MusicBrainz search failed, treating as no match"
                );
                Vec::new()
            }
        }
    }

    async fn try_search(
        &self,
        artist: &str,
        track: &str,
        track_mbid: Option<&str>,
        artist_mbid: Option<&str>,
    ) -> Result<Vec<RecordingCandidate>, MBError> {
        // Rate limit applies to every query shape
        self.rate_limiter.wait().await;

        if let Some(mbid) = track_mbid {
            // Direct lookup returns a single recording object
            let url = format!("{}/recording/{}", MUSICBRAINZ_BASE_URL, mbid);
            let recording: MBRecording = self.get_json(&url, &[("fmt", "json")]).await?;
            return Ok(vec![candidate_from(recording)]);
        }

        let url = format!("{}/recording/", MUSICBRAINZ_BASE_URL);
        let quoted_track = format!("\"{}\"", track);
        let response: MBSearchResponse = if let Some(mbid) = artist_mbid {
            self.get_json(
                &url,
                &[
                    ("artist", mbid),
                    ("query", quoted_track.as_str()),
                    ("fmt", "json"),
                ],
            )
            .await?
        } else {
            let query = format!("recording:\"{}\" AND artist:\"{}\"", track, artist);
            self.get_json(&url, &[("query", query.as_str()), ("fmt", "json")])
                .await?
        };

        Ok(response.recordings.into_iter().map(candidate_from).collect())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, MBError> {
        tracing::debug!(url = %url, "Querying MusicBrainz API");

        let response = self
            .http_client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| MBError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MBError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| MBError::ParseError(e.to_string()))
    }
}

fn candidate_from(recording: MBRecording) -> RecordingCandidate {
    let credit = recording
        .artist_credit
        .as_ref()
        .and_then(|credits| credits.first());
    let release = recording
        .releases
        .as_ref()
        .and_then(|releases| releases.first());

    RecordingCandidate {
        artist: credit.map(|credit| credit.name.clone()),
        artist_mbid: credit.map(|credit| credit.artist.id.clone()),
        album: release.map(|release| release.title.clone()),
        album_mbid: release.map(|release| release.id.clone()),
        id: recording.id,
        title: recording.title,
        length_ms: recording.length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(1000);
        assert_eq!(limiter.min_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_client_creation() {
        let client = MusicBrainzClient::new();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_rate_limiter_timing() {
        let limiter = RateLimiter::new(200); // shortened for a faster test

        let start = Instant::now();

        // First request - no wait
        limiter.wait().await;
        let first_elapsed = start.elapsed();

        // Second and third requests - ~200ms apart each
        limiter.wait().await;
        limiter.wait().await;
        let third_elapsed = start.elapsed();

        assert!(first_elapsed < Duration::from_millis(100));
        // N requests take at least (N-1) * interval
        assert!(third_elapsed >= Duration::from_millis(380));
    }

    #[test]
    fn test_candidate_minutes_conversion() {
        let candidate = RecordingCandidate {
            id: "mbid-1".to_string(),
            title: "Creep".to_string(),
            length_ms: Some(238_000),
            artist: None,
            artist_mbid: None,
            album: None,
            album_mbid: None,
        };
        assert_eq!(candidate.minutes(), Some(238_000.0 / 1000.0 / 60.0));
    }

    #[test]
    fn test_candidate_minutes_absent_or_zero() {
        let mut candidate = RecordingCandidate {
            id: "mbid-1".to_string(),
            title: "Creep".to_string(),
            length_ms: None,
            artist: None,
            artist_mbid: None,
            album: None,
            album_mbid: None,
        };
        assert_eq!(candidate.minutes(), None);
        candidate.length_ms = Some(0);
        assert_eq!(candidate.minutes(), None);
    }

    #[test]
    fn test_search_response_wire_parsing() {
        let json = r#"{
            "recordings": [
                {
                    "id": "rec-1",
                    "title": "Creep",
                    "length": 238000,
                    "artist-credit": [
                        {"name": "Radiohead", "artist": {"id": "art-1", "name": "Radiohead"}}
                    ],
                    "releases": [
                        {"id": "rel-1", "title": "Pablo Honey"}
                    ]
                },
                {
                    "id": "rec-2",
                    "title": "Creep (acoustic)"
                }
            ]
        }"#;

        let response: MBSearchResponse = serde_json::from_str(json).expect("search should parse");
        let candidates: Vec<RecordingCandidate> =
            response.recordings.into_iter().map(candidate_from).collect();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, "rec-1");
        assert_eq!(candidates[0].length_ms, Some(238_000));
        assert_eq!(candidates[0].artist.as_deref(), Some("Radiohead"));
        assert_eq!(candidates[0].artist_mbid.as_deref(), Some("art-1"));
        assert_eq!(candidates[0].album.as_deref(), Some("Pablo Honey"));

        // Sparse rows parse with everything optional missing
        assert_eq!(candidates[1].length_ms, None);
        assert!(candidates[1].artist.is_none());
        assert!(candidates[1].album.is_none());
    }

    #[test]
    fn test_single_recording_wire_parsing() {
        let json = r#"{
            "id": "rec-9",
            "title": "Karma Police",
            "length": 261000,
            "artist-credit": [
                {"name": "Radiohead", "artist": {"id": "art-1", "name": "Radiohead"}}
            ]
        }"#;

        let recording: MBRecording = serde_json::from_str(json).expect("recording should parse");
        let candidate = candidate_from(recording);
        assert_eq!(candidate.id, "rec-9");
        assert_eq!(candidate.length_ms, Some(261_000));
        assert!(candidate.album.is_none());
    }
}
