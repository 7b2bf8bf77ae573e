//! # Taste Profile
//!
//! Aggregates historical play/skip events into per-artist, per-mood,
//! per-tag and per-year accumulators. Artists are weighted by listening
//! duration rather than play count: a five-second skip contributes almost
//! nothing next to a full play. The profile is rebuilt in full from the
//! complete set of history files on every regeneration; there is no
//! incremental merge to drift.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{MixgenError, Result};
use crate::tag_cache::TagMoodCache;
use crate::track::track_id;

/// One listening event from a streaming-history export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayEvent {
    #[serde(alias = "master_metadata_album_artist_name")]
    pub artist: Option<String>,
    #[serde(alias = "master_metadata_track_name")]
    pub track: Option<String>,
    #[serde(default)]
    pub ms_played: u64,
    #[serde(default)]
    pub skipped: bool,
    #[serde(alias = "ts")]
    pub timestamp: Option<String>,
}

/// Aggregated preference weights, consumed read-only by scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TasteProfile {
    #[serde(default)]
    pub artist_scores: HashMap<String, f64>,
    /// Read by scoring but never populated by the history builder; play
    /// events carry no genre signal.
    #[serde(default)]
    pub genre_scores: HashMap<String, f64>,
    #[serde(default)]
    pub mood_scores: HashMap<String, u32>,
    #[serde(default)]
    pub tag_scores: HashMap<String, u32>,
    #[serde(default)]
    pub year_scores: HashMap<i32, u32>,
    #[serde(default)]
    pub track_play_counts: HashMap<String, u32>,
    #[serde(default)]
    pub track_skip_counts: HashMap<String, u32>,
    #[serde(default)]
    pub generated_at: String,
}

impl TasteProfile {
    /// Build a profile from a sequence of events.
    ///
    /// Events lacking both identity fields are dropped. Mood and tag counts
    /// come from read-only cache lookups (an unresolved track simply
    /// contributes nothing). Malformed timestamps are skipped silently.
    #[must_use]
    pub fn build(events: &[PlayEvent], cache: &TagMoodCache) -> Self {
        let mut profile = TasteProfile::default();

        for event in events {
            let (Some(artist), Some(track)) = (event.artist.as_deref(), event.track.as_deref())
            else {
                continue;
            };
            if artist.is_empty() || track.is_empty() {
                continue;
            }

            let id = track_id(artist, track);
            *profile.artist_scores.entry(artist.to_string()).or_insert(0.0) +=
                event.ms_played as f64;
            *profile.track_play_counts.entry(id.clone()).or_insert(0) += 1;
            if event.skipped {
                *profile.track_skip_counts.entry(id.clone()).or_insert(0) += 1;
            }

            if let Some(entry) = cache.get(&id) {
                if let Some(mood) = entry.mood {
                    *profile.mood_scores.entry(mood.as_str().to_string()).or_insert(0) += 1;
                }
                for tag in &entry.tags {
                    *profile.tag_scores.entry(tag.to_lowercase()).or_insert(0) += 1;
                }
            }

            if let Some(ts) = event.timestamp.as_deref() {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(ts) {
                    use chrono::Datelike;
                    *profile.year_scores.entry(parsed.year()).or_insert(0) += 1;
                }
            }
        }

        profile.generated_at = Utc::now().to_rfc3339();
        profile
    }

    /// Build a profile from every `*.json` history file under `dir`.
    pub fn build_from_dir(dir: &Path, cache: &TagMoodCache) -> Result<Self> {
        let events = load_history_events(dir)?;
        Ok(Self::build(&events, cache))
    }

    /// Persist the profile as a JSON document.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Saved taste profile to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// All listening events ever seen for a track, played or skipped.
    #[must_use]
    pub fn plays_of(&self, id: &str) -> u32 {
        self.track_play_counts.get(id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn skips_of(&self, id: &str) -> u32 {
        self.track_skip_counts.get(id).copied().unwrap_or(0)
    }
}

/// Load every `*.json` history file under `dir`.
///
/// Files that fail to parse are logged and skipped; a directory with no
/// loadable history files at all is a terminal condition for the run.
pub fn load_history_events(dir: &Path) -> Result<Vec<PlayEvent>> {
    let mut events = Vec::new();
    let mut files = 0usize;
    for path in history_files(dir)? {
        match fs::read_to_string(&path)
            .map_err(MixgenError::Io)
            .and_then(|data| serde_json::from_str::<Vec<PlayEvent>>(&data).map_err(Into::into))
        {
            Ok(mut parsed) => {
                info!("Processing history file {} ({} events)", path.display(), parsed.len());
                events.append(&mut parsed);
                files += 1;
            }
            Err(err) => warn!("Failed to load history file {}: {err}", path.display()),
        }
    }
    if files == 0 {
        return Err(MixgenError::NoHistory(dir.to_path_buf()));
    }
    Ok(events)
}

/// Sorted list of history files, so rebuilds do not depend on directory
/// iteration order.
fn history_files(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut paths = Vec::new();
    if dir.is_dir() {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mood::Mood;
    use crate::tag_cache::{TagMoodCache, TagSource};

    struct CannedSource(Vec<String>);

    impl TagSource for CannedSource {
        fn fetch_tags(&self, _artist: &str, _title: &str) -> Vec<String> {
            self.0.clone()
        }
    }

    fn event(artist: &str, track: &str, ms: u64, skipped: bool, ts: &str) -> PlayEvent {
        PlayEvent {
            artist: Some(artist.to_string()),
            track: Some(track.to_string()),
            ms_played: ms,
            skipped,
            timestamp: Some(ts.to_string()),
        }
    }

    fn empty_cache() -> TagMoodCache {
        TagMoodCache::empty(Path::new("/nonexistent/cache.json"))
    }

    #[test]
    fn test_build_accumulates_duration_plays_and_skips() {
        let events = vec![
            event("A", "X", 40_000, false, "2021-06-01T10:00:00Z"),
            event("A", "X", 40_000, false, "2021-06-02T10:00:00Z"),
            event("A", "X", 20_000, true, "2022-01-01T10:00:00Z"),
        ];
        let profile = TasteProfile::build(&events, &empty_cache());

        assert_eq!(profile.artist_scores["A"], 100_000.0);
        assert_eq!(profile.plays_of("a - x"), 3);
        assert_eq!(profile.skips_of("a - x"), 1);
        assert_eq!(profile.year_scores[&2021], 2);
        assert_eq!(profile.year_scores[&2022], 1);
    }

    #[test]
    fn test_events_without_identity_are_dropped() {
        let events = vec![
            PlayEvent { ms_played: 10_000, ..Default::default() },
            PlayEvent { artist: Some("A".into()), ms_played: 10_000, ..Default::default() },
            PlayEvent { track: Some("X".into()), ms_played: 10_000, ..Default::default() },
        ];
        let profile = TasteProfile::build(&events, &empty_cache());
        assert!(profile.artist_scores.is_empty());
        assert!(profile.track_play_counts.is_empty());
    }

    #[test]
    fn test_malformed_timestamps_are_skipped_silently() {
        let events = vec![event("A", "X", 1000, false, "not a timestamp")];
        let profile = TasteProfile::build(&events, &empty_cache());
        assert!(profile.year_scores.is_empty());
        assert_eq!(profile.plays_of("a - x"), 1);
    }

    #[test]
    fn test_mood_and_tags_come_from_cache_read_only() {
        let source = CannedSource(vec!["Happy".to_string(), "Upbeat".to_string()]);
        let mut cache = empty_cache();
        cache.resolve("A", "X", &source, None);

        let events = vec![
            event("A", "X", 1000, false, "2021-06-01T10:00:00Z"),
            event("B", "Y", 1000, false, "2021-06-01T10:05:00Z"),
        ];
        let profile = TasteProfile::build(&events, &cache);

        assert_eq!(profile.mood_scores[Mood::Happy.as_str()], 1);
        assert_eq!(profile.tag_scores["happy"], 1);
        assert_eq!(profile.tag_scores["upbeat"], 1);
        // "B - Y" is not in the cache and contributes no mood or tags, but
        // still counts as a play.
        assert_eq!(profile.plays_of("b - y"), 1);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let events = vec![
            event("A", "X", 5000, false, "2020-03-04T00:00:00Z"),
            event("B", "Y", 7000, true, "2020-05-06T00:00:00Z"),
        ];
        let cache = empty_cache();
        let first = TasteProfile::build(&events, &cache);
        let second = TasteProfile::build(&events, &cache);

        assert_eq!(first.artist_scores, second.artist_scores);
        assert_eq!(first.mood_scores, second.mood_scores);
        assert_eq!(first.tag_scores, second.tag_scores);
        assert_eq!(first.year_scores, second.year_scores);
        assert_eq!(first.track_play_counts, second.track_play_counts);
        assert_eq!(first.track_skip_counts, second.track_skip_counts);
    }

    #[test]
    fn test_build_from_dir_requires_history_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = TasteProfile::build_from_dir(dir.path(), &empty_cache());
        assert!(matches!(err, Err(MixgenError::NoHistory(_))));
    }

    #[test]
    fn test_build_from_dir_skips_bad_files() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("bad.json"), b"{ nope").unwrap();
        fs::write(
            dir.path().join("good.json"),
            serde_json::to_string(&vec![event("A", "X", 1000, false, "2021-01-01T00:00:00Z")])
                .unwrap(),
        )
        .unwrap();

        let profile = TasteProfile::build_from_dir(dir.path(), &empty_cache()).unwrap();
        assert_eq!(profile.plays_of("a - x"), 1);
    }

    #[test]
    fn test_profile_round_trips_through_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("profile.json");
        let events = vec![event("A", "X", 1000, false, "2021-01-01T00:00:00Z")];
        let profile = TasteProfile::build(&events, &empty_cache());
        profile.save(&path).unwrap();

        let loaded = TasteProfile::load(&path).unwrap();
        assert_eq!(loaded.artist_scores, profile.artist_scores);
        assert!(!loaded.generated_at.is_empty());
    }

    #[test]
    fn test_spotify_field_aliases() {
        let raw = r#"[{
            "master_metadata_album_artist_name": "A",
            "master_metadata_track_name": "X",
            "ms_played": 12345,
            "skipped": true,
            "ts": "2021-01-01T00:00:00Z"
        }]"#;
        let events: Vec<PlayEvent> = serde_json::from_str(raw).unwrap();
        assert_eq!(events[0].artist.as_deref(), Some("A"));
        assert_eq!(events[0].track.as_deref(), Some("X"));
        assert_eq!(events[0].ms_played, 12345);
        assert!(events[0].skipped);
    }
}
