//! Last.fm API client
//!
//! Paginated listening-history fetch plus per-track duration and album-art
//! lookups against the audioscrobbler web service. One client is built per
//! aggregation run with the run's API key.

use lstn_common::models::Scrobble;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const LASTFM_BASE_URL: &str = "https://ws.audioscrobbler.com/2.0/";
const USER_AGENT: &str = "lstn-se/0.1.0 (https://github.com/lstn-music/lstn)";

/// Fixed history page size
pub const PAGE_SIZE: u32 = 200;

/// Last.fm client errors
#[derive(Debug, Error)]
pub enum LastfmError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// One fetched history page: completed scrobbles plus the total page count
#[derive(Debug)]
pub struct RecentTracksPage {
    pub scrobbles: Vec<Scrobble>,
    pub total_pages: u32,
}

// Wire types. Last.fm nests plain values under "#text" and metadata under
// "@attr", and carries numbers as strings.

#[derive(Debug, Deserialize)]
struct RecentTracksResponse {
    recenttracks: Option<RecentTracksBody>,
}

#[derive(Debug, Deserialize)]
struct RecentTracksBody {
    #[serde(default)]
    track: Vec<WireTrack>,
    #[serde(rename = "@attr")]
    attr: RecentTracksAttr,
}

#[derive(Debug, Deserialize)]
struct RecentTracksAttr {
    #[serde(rename = "totalPages")]
    total_pages: String,
}

#[derive(Debug, Deserialize)]
struct WireTrack {
    name: String,
    artist: WireArtist,
    #[serde(default)]
    album: Option<WireText>,
    #[serde(default)]
    date: Option<WireDate>,
    #[serde(default)]
    mbid: Option<String>,
    #[serde(rename = "@attr", default)]
    attr: Option<WireTrackAttr>,
}

#[derive(Debug, Deserialize)]
struct WireArtist {
    #[serde(rename = "#text")]
    name: String,
    #[serde(default)]
    mbid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireText {
    #[serde(rename = "#text")]
    text: String,
}

#[derive(Debug, Deserialize)]
struct WireDate {
    uts: String,
}

#[derive(Debug, Deserialize)]
struct WireTrackAttr {
    #[serde(default)]
    nowplaying: Option<String>,
}

impl WireTrack {
    /// An event still under way; it has no play timestamp yet
    fn is_now_playing(&self) -> bool {
        self.attr
            .as_ref()
            .and_then(|attr| attr.nowplaying.as_deref())
            .is_some_and(|flag| !flag.is_empty())
    }

    fn into_scrobble(self) -> Scrobble {
        let played_at = self
            .date
            .as_ref()
            .and_then(|date| date.uts.parse().ok())
            .unwrap_or(0);
        Scrobble {
            track: self.name,
            artist: self.artist.name,
            artist_mbid: non_empty(self.artist.mbid),
            album: self.album.map(|album| album.text).unwrap_or_default(),
            mbid: non_empty(self.mbid),
            played_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TrackInfoResponse {
    track: Option<TrackInfoBody>,
}

#[derive(Debug, Deserialize)]
struct TrackInfoBody {
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlbumInfoResponse {
    album: Option<AlbumInfoBody>,
}

#[derive(Debug, Deserialize)]
struct AlbumInfoBody {
    #[serde(default)]
    image: Vec<WireImage>,
}

#[derive(Debug, Deserialize)]
struct WireImage {
    #[serde(rename = "#text")]
    url: String,
    size: String,
}

/// Last.fm API client
pub struct LastfmClient {
    http_client: reqwest::Client,
    api_key: String,
}

impl LastfmClient {
    pub fn new(api_key: String) -> Result<Self, LastfmError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LastfmError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
        })
    }

    /// Fetch one history page for the inclusive [from, to] range
    ///
    /// In-progress rows are dropped here; row order is otherwise preserved.
    /// Any non-success status fails the call, and the caller treats that as
    /// fatal for the whole run.
    pub async fn recent_tracks_page(
        &self,
        user: &str,
        from: i64,
        to: i64,
        page: u32,
    ) -> Result<RecentTracksPage, LastfmError> {
        tracing::debug!(user = %user, page = page, "Fetching history page");

        let response = self
            .http_client
            .get(LASTFM_BASE_URL)
            .query(&[
                ("method", "user.getrecenttracks"),
                ("user", user),
                ("api_key", self.api_key.as_str()),
                ("format", "json"),
                ("limit", &PAGE_SIZE.to_string()),
                ("page", &page.to_string()),
                ("from", &from.to_string()),
                ("to", &to.to_string()),
            ])
            .send()
            .await
            .map_err(|e| LastfmError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LastfmError::ApiError(status.as_u16(), error_text));
        }

        let body: RecentTracksResponse = response
            .json()
            .await
            .map_err(|e| LastfmError::ParseError(e.to_string()))?;

        let Some(recent) = body.recenttracks else {
            return Ok(RecentTracksPage {
                scrobbles: Vec::new(),
                total_pages: 0,
            });
        };

        let total_pages = recent
            .attr
            .total_pages
            .parse::<u32>()
            .map_err(|e| LastfmError::ParseError(format!("totalPages: {}", e)))?;

        let scrobbles = recent
            .track
            .into_iter()
            .filter(|track| !track.is_now_playing())
            .map(WireTrack::into_scrobble)
            .collect();

        Ok(RecentTracksPage {
            scrobbles,
            total_pages,
        })
    }

    /// Per-track duration in minutes via track.getInfo
    ///
    /// The wire value is a millisecond count in a string. Absent, unparsable,
    /// or non-positive values (the API reports "0" for unknown lengths) are
    /// non-authoritative and yield None so the caller can fall back.
    pub async fn track_duration(
        &self,
        artist: &str,
        track: &str,
    ) -> Result<Option<f64>, LastfmError> {
        let response = self
            .http_client
            .get(LASTFM_BASE_URL)
            .query(&[
                ("method", "track.getInfo"),
                ("artist", artist),
                ("track", track),
                ("api_key", self.api_key.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| LastfmError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LastfmError::ApiError(status.as_u16(), error_text));
        }

        let body: TrackInfoResponse = response
            .json()
            .await
            .map_err(|e| LastfmError::ParseError(e.to_string()))?;

        Ok(body
            .track
            .and_then(|info| info.duration)
            .and_then(|raw| duration_minutes(&raw)))
    }

    /// Large-size album art URL via album.getinfo, when the API has one
    pub async fn album_art(
        &self,
        artist: &str,
        album: &str,
    ) -> Result<Option<String>, LastfmError> {
        let response = self
            .http_client
            .get(LASTFM_BASE_URL)
            .query(&[
                ("method", "album.getinfo"),
                ("artist", artist),
                ("album", album),
                ("api_key", self.api_key.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| LastfmError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LastfmError::ApiError(status.as_u16(), error_text));
        }

        let body: AlbumInfoResponse = response
            .json()
            .await
            .map_err(|e| LastfmError::ParseError(e.to_string()))?;

        Ok(body.album.and_then(|album| {
            album
                .image
                .into_iter()
                .find(|image| image.size == "large" && !image.url.is_empty())
                .map(|image| image.url)
        }))
    }
}

/// The wire uses empty strings where an id is simply unknown
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}

/// Millisecond string to minutes, None unless strictly positive
fn duration_minutes(raw: &str) -> Option<f64> {
    let millis: f64 = raw.parse().ok()?;
    if millis > 0.0 {
        Some(millis / 1000.0 / 60.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LastfmClient::new("test_key".to_string());
        assert!(client.is_ok());
    }

    #[test]
    fn test_duration_minutes_conversion() {
        assert_eq!(duration_minutes("180000"), Some(3.0));
        assert_eq!(duration_minutes("270000"), Some(4.5));
    }

    #[test]
    fn test_duration_minutes_rejects_zero_and_garbage() {
        // "0" means the API does not actually know the length
        assert_eq!(duration_minutes("0"), None);
        assert_eq!(duration_minutes("-100"), None);
        assert_eq!(duration_minutes("abc"), None);
        assert_eq!(duration_minutes(""), None);
    }

    #[test]
    fn test_recent_tracks_wire_parsing() {
        let json = r##"{
            "recenttracks": {
                "track": [
                    {
                        "name": "Creep",
                        "artist": {"#text": "Radiohead", "mbid": "a74b1b7f-71a5-4011-9441-d0b5e4122711"},
                        "album": {"#text": "Pablo Honey"},
                        "date": {"uts": "1710505800"},
                        "mbid": ""
                    },
                    {
                        "name": "Weird Fishes",
                        "artist": {"#text": "Radiohead", "mbid": ""},
                        "album": {"#text": "In Rainbows"},
                        "@attr": {"nowplaying": "true"}
                    }
                ],
                "@attr": {"totalPages": "3"}
            }
        }"##;

        let body: RecentTracksResponse = serde_json::from_str(json).expect("page should parse");
        let recent = body.recenttracks.expect("recenttracks present");
        assert_eq!(recent.attr.total_pages, "3");
        assert_eq!(recent.track.len(), 2);

        // Second row is an in-progress play and must be filtered
        assert!(!recent.track[0].is_now_playing());
        assert!(recent.track[1].is_now_playing());

        let scrobbles: Vec<Scrobble> = recent
            .track
            .into_iter()
            .filter(|track| !track.is_now_playing())
            .map(WireTrack::into_scrobble)
            .collect();
        assert_eq!(scrobbles.len(), 1);
        assert_eq!(scrobbles[0].track, "Creep");
        assert_eq!(scrobbles[0].artist, "Radiohead");
        assert_eq!(scrobbles[0].album, "Pablo Honey");
        assert_eq!(scrobbles[0].played_at, 1_710_505_800);
        // Empty mbid strings collapse to None
        assert!(scrobbles[0].mbid.is_none());
        assert_eq!(
            scrobbles[0].artist_mbid.as_deref(),
            Some("a74b1b7f-71a5-4011-9441-d0b5e4122711")
        );
    }

    #[test]
    fn test_track_info_wire_parsing() {
        let json = r#"{"track": {"duration": "207000"}}"#;
        let body: TrackInfoResponse = serde_json::from_str(json).expect("info should parse");
        let minutes = body
            .track
            .and_then(|info| info.duration)
            .and_then(|raw| duration_minutes(&raw));
        assert_eq!(minutes, Some(3.45));
    }

    #[test]
    fn test_album_info_wire_parsing_picks_large() {
        let json = r##"{
            "album": {
                "image": [
                    {"#text": "http://img/small.png", "size": "small"},
                    {"#text": "http://img/large.png", "size": "large"},
                    {"#text": "http://img/xl.png", "size": "extralarge"}
                ]
            }
        }"##;
        let body: AlbumInfoResponse = serde_json::from_str(json).expect("album should parse");
        let url = body.album.and_then(|album| {
            album
                .image
                .into_iter()
                .find(|image| image.size == "large" && !image.url.is_empty())
                .map(|image| image.url)
        });
        assert_eq!(url.as_deref(), Some("http://img/large.png"));
    }
}
