//! Persistent track-duration cache
//!
//! A single JSON document on disk holding resolved durations keyed by the
//! exact (artist, track) pair. Loaded lazily on first access; the whole
//! document is rewritten on every mutation. Entries live until explicitly
//! cleared.

use lstn_common::models::TrackKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

/// One persisted cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    artist: String,
    track: String,
    minutes: f64,
}

/// Persistent mapping from (artist, track) to a duration in minutes
///
/// Handlers share one instance; every operation is synchronous and holds the
/// lock only briefly. The aggregation loop itself is sequential, so the lock
/// sees no contention during a run.
pub struct DurationCache {
    path: PathBuf,
    entries: Mutex<HashMap<TrackKey, f64>>,
}

impl DurationCache {
    /// Create a cache backed by the given file; nothing is read until first use
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a cached duration in minutes
    pub fn get(&self, key: &TrackKey) -> Option<f64> {
        let mut entries = self.lock();
        if entries.is_empty() {
            self.load_into(&mut entries);
        }
        entries.get(key).copied()
    }

    /// Insert a duration and persist immediately
    pub fn set(&self, key: TrackKey, minutes: f64) {
        let mut entries = self.lock();
        if entries.is_empty() {
            self.load_into(&mut entries);
        }
        entries.insert(key, minutes);
        self.persist(&entries);
    }

    /// Drop every entry and persist the empty state
    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.clear();
        self.persist(&entries);
    }

    /// Number of cached durations
    pub fn count(&self) -> usize {
        let mut entries = self.lock();
        if entries.is_empty() {
            self.load_into(&mut entries);
        }
        entries.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TrackKey, f64>> {
        // Lock poisoning would require a panic mid-operation; recover with
        // the map as it was rather than propagating the panic
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// A read or parse failure falls back to an empty cache, never an error
    fn load_into(&self, entries: &mut HashMap<TrackKey, f64>) {
        if !self.path.exists() {
            return;
        }
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Duration cache unreadable, starting empty");
                return;
            }
        };
        match serde_json::from_str::<Vec<CacheEntry>>(&contents) {
            Ok(list) => {
                for entry in list {
                    entries.insert(TrackKey::new(entry.artist, entry.track), entry.minutes);
                }
                debug!(count = entries.len(), path = %self.path.display(), "Duration cache loaded");
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Duration cache corrupt, starting empty");
            }
        }
    }

    /// A write failure is logged; the in-memory state stays authoritative
    fn persist(&self, entries: &HashMap<TrackKey, f64>) {
        let mut list: Vec<CacheEntry> = entries
            .iter()
            .map(|(key, minutes)| CacheEntry {
                artist: key.artist.clone(),
                track: key.track.clone(),
                minutes: *minutes,
            })
            .collect();
        list.sort_by(|a, b| (&a.artist, &a.track).cmp(&(&b.artist, &b.track)));

        let json = match serde_json::to_string(&list) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Duration cache serialization failed");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, json) {
            warn!(path = %self.path.display(), error = %e, "Duration cache write failed");
        }
    }
}
