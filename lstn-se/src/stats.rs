//! Multi-dimensional scrobble statistics
//!
//! The per-event fold shared by the full aggregation pass and the
//! incremental manual-match path. Buckets accumulate at full precision;
//! sorting, truncation, and 2-decimal rounding happen when a snapshot is
//! materialized, so every snapshot that leaves this module satisfies the
//! rounding invariant.

use lstn_common::models::{
    AlbumStats, ArtistStats, PeriodStat, Scrobble, StatsSnapshot, TrackKey, TrackStats,
};
use lstn_common::time::{day_key, month_key, round2};
use std::collections::{HashMap, HashSet};

/// Maximum entries kept in the top-albums and top-tracks lists
pub const TOP_LIST_LEN: usize = 10;

/// Accumulation state for one aggregation run
#[derive(Debug)]
pub struct StatsBuilder {
    total_minutes: f64,
    total_tracks: usize,
    unique_tracks: usize,
    artists: HashMap<String, ArtistStats>,
    albums: HashMap<(String, String), AlbumStats>,
    months: HashMap<String, f64>,
    days: HashMap<String, f64>,
    tracks: HashMap<TrackKey, TrackStats>,
    unmatched: Vec<Scrobble>,
}

impl StatsBuilder {
    /// Empty builder with pre-computed totals
    pub fn new(total_tracks: usize, unique_tracks: usize) -> Self {
        Self {
            total_minutes: 0.0,
            total_tracks,
            unique_tracks,
            artists: HashMap::new(),
            albums: HashMap::new(),
            months: HashMap::new(),
            days: HashMap::new(),
            tracks: HashMap::new(),
            unmatched: Vec::new(),
        }
    }

    /// Seed a builder from the full fetched scrobble list
    ///
    /// Totals cover every fetched scrobble, including any that later turn
    /// out to be unmatched.
    pub fn for_scrobbles(scrobbles: &[Scrobble]) -> Self {
        let unique: HashSet<(&str, &str)> = scrobbles
            .iter()
            .map(|scrobble| (scrobble.artist.as_str(), scrobble.track.as_str()))
            .collect();
        Self::new(scrobbles.len(), unique.len())
    }

    /// Fold one resolved scrobble into every bucket
    pub fn fold(&mut self, scrobble: &Scrobble, minutes: f64) {
        self.total_minutes += minutes;

        let artist = self
            .artists
            .entry(scrobble.artist.clone())
            .or_insert_with(|| ArtistStats {
                count: 0,
                minutes: 0.0,
                mbid: scrobble.artist_mbid.clone(),
            });
        artist.count += 1;
        artist.minutes += minutes;

        *self
            .months
            .entry(month_key(scrobble.played_at))
            .or_insert(0.0) += minutes;
        *self.days.entry(day_key(scrobble.played_at)).or_insert(0.0) += minutes;

        let album = self
            .albums
            .entry((scrobble.album.clone(), scrobble.artist.clone()))
            .or_insert_with(|| AlbumStats {
                name: scrobble.album.clone(),
                artist: scrobble.artist.clone(),
                minutes: 0.0,
                image_url: String::new(),
            });
        album.minutes += minutes;

        let track = self
            .tracks
            .entry(scrobble.key())
            .or_insert_with(|| TrackStats {
                name: scrobble.track.clone(),
                artist: scrobble.artist.clone(),
                count: 0,
                minutes: 0.0,
            });
        track.count += 1;
        track.minutes += minutes;
    }

    /// Route a scrobble whose duration could not be resolved
    pub fn push_unmatched(&mut self, scrobble: Scrobble) {
        self.unmatched.push(scrobble);
    }

    /// Materialize the current state: sorted, truncated, rounded
    pub fn snapshot(&self) -> StatsSnapshot {
        let mut monthly: Vec<PeriodStat> = self
            .months
            .iter()
            .map(|(period, minutes)| PeriodStat {
                period: period.clone(),
                minutes: round2(*minutes),
            })
            .collect();
        monthly.sort_by(|a, b| a.period.cmp(&b.period));

        let mut daily: Vec<PeriodStat> = self
            .days
            .iter()
            .map(|(period, minutes)| PeriodStat {
                period: period.clone(),
                minutes: round2(*minutes),
            })
            .collect();
        daily.sort_by(|a, b| a.period.cmp(&b.period));

        // Sort on full precision, then round what survives the cut
        let mut top_albums: Vec<AlbumStats> = self.albums.values().cloned().collect();
        top_albums.sort_by(|a, b| b.minutes.total_cmp(&a.minutes));
        top_albums.truncate(TOP_LIST_LEN);
        for album in &mut top_albums {
            album.minutes = round2(album.minutes);
        }

        let mut top_tracks: Vec<TrackStats> = self.tracks.values().cloned().collect();
        top_tracks.sort_by(|a, b| b.minutes.total_cmp(&a.minutes));
        top_tracks.truncate(TOP_LIST_LEN);
        for track in &mut top_tracks {
            track.minutes = round2(track.minutes);
        }

        let artists = self
            .artists
            .iter()
            .map(|(name, stats)| {
                (
                    name.clone(),
                    ArtistStats {
                        count: stats.count,
                        minutes: round2(stats.minutes),
                        mbid: stats.mbid.clone(),
                    },
                )
            })
            .collect();

        StatsSnapshot {
            total_minutes: round2(self.total_minutes),
            total_tracks: self.total_tracks,
            unique_tracks: self.unique_tracks,
            artists,
            monthly,
            daily,
            top_albums,
            top_tracks,
            unmatched: self.unmatched.clone(),
        }
    }
}

/// Fold a manually supplied duration into a materialized snapshot
///
/// The incremental path: one user correction at a time, applied to the
/// snapshot the UI already holds. Removes every unmatched entry with the
/// same (artist, track) pair while folding a single duration's worth of
/// minutes: repeats of an unmatched track are considered resolved by one
/// correction. Returns a new snapshot; the caller is responsible for
/// writing the duration to the cache first.
pub fn apply_manual_match(
    snapshot: &StatsSnapshot,
    scrobble: &Scrobble,
    minutes: f64,
) -> StatsSnapshot {
    let mut updated = snapshot.clone();

    updated.total_minutes += minutes;

    let artist = updated
        .artists
        .entry(scrobble.artist.clone())
        .or_insert_with(|| ArtistStats {
            count: 0,
            minutes: 0.0,
            mbid: scrobble.artist_mbid.clone(),
        });
    artist.count += 1;
    artist.minutes += minutes;

    accumulate_period(&mut updated.monthly, month_key(scrobble.played_at), minutes);
    accumulate_period(&mut updated.daily, day_key(scrobble.played_at), minutes);

    // Album upsert with eager re-sort; one correction at a time makes the
    // per-update sort affordable
    let album_index = updated
        .top_albums
        .iter()
        .position(|album| album.name == scrobble.album && album.artist == scrobble.artist);
    match album_index {
        Some(index) => updated.top_albums[index].minutes += minutes,
        None => updated.top_albums.push(AlbumStats {
            name: scrobble.album.clone(),
            artist: scrobble.artist.clone(),
            minutes,
            image_url: String::new(),
        }),
    }
    updated
        .top_albums
        .sort_by(|a, b| b.minutes.total_cmp(&a.minutes));
    updated.top_albums.truncate(TOP_LIST_LEN);

    // Remove ALL unmatched instances of this (artist, track) pair
    updated
        .unmatched
        .retain(|entry| entry.track != scrobble.track || entry.artist != scrobble.artist);

    round_snapshot(&mut updated);
    updated
}

/// Sorted insertion into an ascending period list
fn accumulate_period(periods: &mut Vec<PeriodStat>, key: String, minutes: f64) {
    match periods.iter().position(|entry| entry.period == key) {
        Some(index) => periods[index].minutes += minutes,
        None => {
            periods.push(PeriodStat {
                period: key,
                minutes,
            });
            periods.sort_by(|a, b| a.period.cmp(&b.period));
        }
    }
}

fn round_snapshot(snapshot: &mut StatsSnapshot) {
    snapshot.total_minutes = round2(snapshot.total_minutes);
    for entry in &mut snapshot.monthly {
        entry.minutes = round2(entry.minutes);
    }
    for entry in &mut snapshot.daily {
        entry.minutes = round2(entry.minutes);
    }
    for album in &mut snapshot.top_albums {
        album.minutes = round2(album.minutes);
    }
    for stats in snapshot.artists.values_mut() {
        stats.minutes = round2(stats.minutes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrobble(artist: &str, track: &str, album: &str, played_at: i64) -> Scrobble {
        Scrobble {
            track: track.to_string(),
            artist: artist.to_string(),
            artist_mbid: None,
            album: album.to_string(),
            mbid: None,
            played_at,
        }
    }

    const MARCH: i64 = 1_710_505_800; // 2024-03-15
    const APRIL: i64 = 1_713_184_200; // 2024-04-15

    #[test]
    fn test_fold_accumulates_all_dimensions() {
        // Two plays of X/A from cache-like durations, one Y/B
        let plays = vec![
            scrobble("X", "A", "First", MARCH),
            scrobble("X", "A", "First", MARCH),
            scrobble("Y", "B", "Second", APRIL),
        ];
        let mut builder = StatsBuilder::for_scrobbles(&plays);
        builder.fold(&plays[0], 3.0);
        builder.fold(&plays[1], 3.0);
        builder.fold(&plays[2], 4.5);

        let stats = builder.snapshot();
        assert_eq!(stats.total_minutes, 10.5);
        assert_eq!(stats.total_tracks, 3);
        assert_eq!(stats.unique_tracks, 2);
        assert_eq!(stats.artists["X"].count, 2);
        assert_eq!(stats.artists["X"].minutes, 6.0);
        assert_eq!(stats.artists["Y"].minutes, 4.5);

        assert_eq!(stats.monthly.len(), 2);
        assert_eq!(stats.monthly[0].period, "2024-03");
        assert_eq!(stats.monthly[0].minutes, 6.0);
        assert_eq!(stats.monthly[1].period, "2024-04");

        assert_eq!(stats.daily.len(), 2);
        assert_eq!(stats.top_albums.len(), 2);
        assert_eq!(stats.top_albums[0].name, "First");
        assert_eq!(stats.top_tracks[0].count, 2);
        assert!(stats.unmatched.is_empty());
    }

    #[test]
    fn test_fold_order_independence() {
        let plays = vec![
            scrobble("X", "A", "First", MARCH),
            scrobble("Y", "B", "Second", APRIL),
            scrobble("X", "C", "First", MARCH),
            scrobble("Z", "D", "Third", APRIL),
        ];
        let durations = [3.25, 4.5, 2.75, 5.0];

        let mut forward = StatsBuilder::for_scrobbles(&plays);
        for (play, minutes) in plays.iter().zip(durations) {
            forward.fold(play, minutes);
        }

        let mut reverse = StatsBuilder::for_scrobbles(&plays);
        for (play, minutes) in plays.iter().zip(durations).rev() {
            reverse.fold(play, minutes);
        }

        let forward_stats = forward.snapshot();
        let reverse_stats = reverse.snapshot();
        assert_eq!(forward_stats.total_minutes, reverse_stats.total_minutes);
        assert_eq!(forward_stats.artists, reverse_stats.artists);
        assert_eq!(forward_stats.unique_tracks, reverse_stats.unique_tracks);
        // Final sorted output is identical regardless of fold order
        assert_eq!(forward_stats.monthly, reverse_stats.monthly);
        assert_eq!(forward_stats.daily, reverse_stats.daily);
    }

    #[test]
    fn test_snapshot_rounds_to_two_decimals() {
        let plays = vec![scrobble("X", "A", "First", MARCH)];
        let mut builder = StatsBuilder::for_scrobbles(&plays);
        // Three folds of a repeating decimal leave > 2 decimal digits raw
        builder.fold(&plays[0], 1.111);
        builder.fold(&plays[0], 1.111);
        builder.fold(&plays[0], 1.111);

        let stats = builder.snapshot();
        assert_eq!(stats.total_minutes, 3.33);
        assert_eq!(stats.artists["X"].minutes, 3.33);
        assert_eq!(stats.monthly[0].minutes, 3.33);
        assert_eq!(stats.daily[0].minutes, 3.33);
        assert_eq!(stats.top_albums[0].minutes, 3.33);
        assert_eq!(stats.top_tracks[0].minutes, 3.33);
    }

    #[test]
    fn test_top_lists_truncate_to_ten() {
        let plays: Vec<Scrobble> = (0..15)
            .map(|i| {
                scrobble(
                    &format!("Artist {}", i),
                    &format!("Track {}", i),
                    &format!("Album {}", i),
                    MARCH,
                )
            })
            .collect();
        let mut builder = StatsBuilder::for_scrobbles(&plays);
        for (i, play) in plays.iter().enumerate() {
            builder.fold(play, (i + 1) as f64);
        }

        let stats = builder.snapshot();
        assert_eq!(stats.top_albums.len(), TOP_LIST_LEN);
        assert_eq!(stats.top_tracks.len(), TOP_LIST_LEN);
        // Descending by minutes; the biggest fold wins
        assert_eq!(stats.top_albums[0].name, "Album 14");
        assert_eq!(stats.top_albums[0].minutes, 15.0);
        assert_eq!(stats.top_tracks[9].minutes, 6.0);
    }

    #[test]
    fn test_unmatched_kept_out_of_buckets() {
        let plays = vec![
            scrobble("X", "A", "First", MARCH),
            scrobble("Z", "C", "", MARCH),
        ];
        let mut builder = StatsBuilder::for_scrobbles(&plays);
        builder.fold(&plays[0], 3.0);
        builder.push_unmatched(plays[1].clone());

        let stats = builder.snapshot();
        assert_eq!(stats.total_minutes, 3.0);
        assert_eq!(stats.total_tracks, 2);
        assert!(!stats.artists.contains_key("Z"));
        assert_eq!(stats.unmatched, vec![plays[1].clone()]);
    }

    #[test]
    fn test_artist_mbid_from_first_sight() {
        let mut with_mbid = scrobble("X", "A", "First", MARCH);
        with_mbid.artist_mbid = Some("mbid-x".to_string());
        let without = scrobble("X", "B", "First", MARCH);

        let plays = vec![with_mbid.clone(), without.clone()];
        let mut builder = StatsBuilder::for_scrobbles(&plays);
        builder.fold(&with_mbid, 1.0);
        builder.fold(&without, 1.0);

        let stats = builder.snapshot();
        assert_eq!(stats.artists["X"].mbid.as_deref(), Some("mbid-x"));
    }

    #[test]
    fn test_manual_match_resolves_unmatched() {
        // Z/C failed every resolution step
        let unresolved = scrobble("Z", "C", "", MARCH);
        let plays = vec![unresolved.clone()];
        let mut builder = StatsBuilder::for_scrobbles(&plays);
        builder.push_unmatched(unresolved.clone());
        let stats = builder.snapshot();
        assert_eq!(stats.total_minutes, 0.0);
        assert_eq!(stats.unmatched.len(), 1);

        let updated = apply_manual_match(&stats, &unresolved, 4.25);
        assert!(updated.unmatched.is_empty());
        assert_eq!(updated.total_minutes, 4.25);
        assert_eq!(updated.artists["Z"].count, 1);
        assert_eq!(updated.artists["Z"].minutes, 4.25);
        assert_eq!(updated.monthly[0].period, "2024-03");
        assert_eq!(updated.monthly[0].minutes, 4.25);
        // The original snapshot is untouched
        assert_eq!(stats.unmatched.len(), 1);
    }

    #[test]
    fn test_manual_match_removes_all_matching_instances() {
        // Three unmatched plays of the same pair plus one other
        let repeated = scrobble("Z", "C", "", MARCH);
        let other = scrobble("W", "D", "", MARCH);
        let plays = vec![
            repeated.clone(),
            repeated.clone(),
            repeated.clone(),
            other.clone(),
        ];
        let mut builder = StatsBuilder::for_scrobbles(&plays);
        for play in &plays {
            builder.push_unmatched(play.clone());
        }

        let updated = apply_manual_match(&builder.snapshot(), &repeated, 2.0);
        // All three repeats leave unmatched; only one duration folds in
        assert_eq!(updated.unmatched, vec![other]);
        assert_eq!(updated.total_minutes, 2.0);
        assert_eq!(updated.artists["Z"].count, 1);
    }

    #[test]
    fn test_manual_match_sorted_insertion_into_periods() {
        let late = scrobble("X", "A", "First", APRIL);
        let plays = vec![late.clone()];
        let mut builder = StatsBuilder::for_scrobbles(&plays);
        builder.fold(&late, 3.0);
        let stats = builder.snapshot();

        // Matching an earlier-month scrobble must insert before April
        let early = scrobble("X", "B", "First", MARCH);
        let updated = apply_manual_match(&stats, &early, 2.0);
        assert_eq!(updated.monthly[0].period, "2024-03");
        assert_eq!(updated.monthly[1].period, "2024-04");
        assert_eq!(updated.daily[0].period, "2024-03-15");
    }

    #[test]
    fn test_manual_match_rounds_every_numeric_field() {
        let play = scrobble("X", "A", "First", MARCH);
        let plays = vec![play.clone()];
        let mut builder = StatsBuilder::for_scrobbles(&plays);
        builder.fold(&play, 1.2);
        let stats = builder.snapshot();

        let updated = apply_manual_match(&stats, &play, 1.005);
        // A value with at most 2 decimal digits is a fixed point of round2
        let has_two_decimals = |value: f64| round2(value) == value;
        assert!(has_two_decimals(updated.total_minutes));
        assert!(has_two_decimals(updated.artists["X"].minutes));
        assert!(has_two_decimals(updated.monthly[0].minutes));
        assert!(has_two_decimals(updated.daily[0].minutes));
        assert!(has_two_decimals(updated.top_albums[0].minutes));
    }

    #[test]
    fn test_manual_match_existing_album_accumulates() {
        let play = scrobble("X", "A", "First", MARCH);
        let plays = vec![play.clone()];
        let mut builder = StatsBuilder::for_scrobbles(&plays);
        builder.fold(&play, 3.0);
        let stats = builder.snapshot();

        let another = scrobble("X", "B", "First", MARCH);
        let updated = apply_manual_match(&stats, &another, 2.0);
        assert_eq!(updated.top_albums.len(), 1);
        assert_eq!(updated.top_albums[0].minutes, 5.0);
    }
}
