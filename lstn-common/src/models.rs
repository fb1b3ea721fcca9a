//! Listening-history data model shared across LSTN services

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One completed listening event
///
/// In-progress ("now playing") rows exist only on the history API wire and
/// are filtered out before this type is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scrobble {
    /// Track title
    pub track: String,
    /// Artist name
    pub artist: String,
    /// Artist MusicBrainz id, when the history API knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_mbid: Option<String>,
    /// Album title (empty when the history API has none)
    #[serde(default)]
    pub album: String,
    /// Track MusicBrainz id, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbid: Option<String>,
    /// Play timestamp (unix seconds, UTC)
    pub played_at: i64,
}

impl Scrobble {
    /// Aggregation identity of this scrobble
    pub fn key(&self) -> TrackKey {
        TrackKey::new(&self.artist, &self.track)
    }
}

/// Composite aggregation key: the exact, case-sensitive (artist, track) pair
///
/// A proper pair rather than a joined string, so titles containing a
/// separator character cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackKey {
    pub artist: String,
    pub track: String,
}

impl TrackKey {
    pub fn new(artist: impl Into<String>, track: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            track: track.into(),
        }
    }
}

/// Per-artist accumulation bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistStats {
    /// Number of plays folded into this bucket
    pub count: u64,
    /// Minutes listened
    pub minutes: f64,
    /// Artist MusicBrainz id from the first scrobble that carried one
    pub mbid: Option<String>,
}

/// Album bucket (top-albums list entry)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumStats {
    pub name: String,
    pub artist: String,
    pub minutes: f64,
    /// Populated on demand via the album-art lookup, never by aggregation
    pub image_url: String,
}

/// Track bucket (top-tracks list entry)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackStats {
    pub name: String,
    pub artist: String,
    pub count: u64,
    pub minutes: f64,
}

/// Minutes listened in one calendar period (month or day)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStat {
    /// Period key: "YYYY-MM" for months, "YYYY-MM-DD" for days (UTC)
    pub period: String,
    pub minutes: f64,
}

/// Aggregate statistics snapshot
///
/// Produced fresh per calculation run; every minutes field carries at most
/// 2 decimal digits whenever a snapshot leaves the aggregation code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Sum of resolved durations across all folded scrobbles
    pub total_minutes: f64,
    /// All fetched scrobbles, including unmatched ones
    pub total_tracks: usize,
    /// Distinct (artist, track) pairs across all fetched scrobbles
    pub unique_tracks: usize,
    /// Artist name -> accumulation bucket
    pub artists: HashMap<String, ArtistStats>,
    /// One entry per distinct month, ascending by period key
    pub monthly: Vec<PeriodStat>,
    /// One entry per distinct day, ascending by period key
    pub daily: Vec<PeriodStat>,
    /// Top 10 albums by minutes, descending
    pub top_albums: Vec<AlbumStats>,
    /// Top 10 tracks by minutes, descending
    pub top_tracks: Vec<TrackStats>,
    /// Scrobbles whose duration could not be resolved automatically
    pub unmatched: Vec<Scrobble>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrobble(artist: &str, track: &str) -> Scrobble {
        Scrobble {
            track: track.to_string(),
            artist: artist.to_string(),
            artist_mbid: None,
            album: String::new(),
            mbid: None,
            played_at: 1_710_505_800,
        }
    }

    #[test]
    fn test_track_key_is_exact_and_case_sensitive() {
        assert_eq!(
            scrobble("Radiohead", "Creep").key(),
            TrackKey::new("Radiohead", "Creep")
        );
        assert_ne!(
            scrobble("Radiohead", "Creep").key(),
            TrackKey::new("radiohead", "Creep")
        );
    }

    #[test]
    fn test_track_key_no_separator_collision() {
        // Joined-string keys would make these two identical ("a-b-c")
        let first = TrackKey::new("a-b", "c");
        let second = TrackKey::new("a", "b-c");
        assert_ne!(first, second);
    }

    #[test]
    fn test_snapshot_serializes_round_trip() {
        let mut snapshot = StatsSnapshot {
            total_minutes: 10.5,
            total_tracks: 3,
            unique_tracks: 2,
            ..Default::default()
        };
        snapshot.artists.insert(
            "X".to_string(),
            ArtistStats {
                count: 2,
                minutes: 6.0,
                mbid: None,
            },
        );
        snapshot.monthly.push(PeriodStat {
            period: "2024-03".to_string(),
            minutes: 10.5,
        });

        let json = serde_json::to_string(&snapshot).expect("snapshot should serialize");
        let back: StatsSnapshot = serde_json::from_str(&json).expect("snapshot should deserialize");
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_scrobble_optional_fields_default() {
        let json = r#"{"track":"C","artist":"Z","played_at":1700000000}"#;
        let scrobble: Scrobble = serde_json::from_str(json).expect("scrobble should deserialize");
        assert_eq!(scrobble.album, "");
        assert!(scrobble.mbid.is_none());
        assert!(scrobble.artist_mbid.is_none());
    }
}
