//! # Track Records
//!
//! The fixed per-track record flowing through the pipeline. Identity is the
//! case-folded `"artist - title"` string; everything optional is a typed
//! `Option` rather than a maybe-missing column, so downstream stages never
//! have to guess whether a field exists.

use serde::{Deserialize, Serialize};

use crate::mood::Mood;

/// One track of the listening library.
///
/// `name`, `artist`, `genre`, `location` and the local play/skip counters
/// come from the library source. `year`, `mood` and `score` are derived and
/// recomputed on every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub name: String,
    pub artist: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub play_count: u32,
    #[serde(default)]
    pub skip_count: u32,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub score: f64,
}

impl TrackRecord {
    /// Normalized identity used as the key into every cache and profile
    /// mapping: `"artist - title"`, trimmed and case-folded.
    #[must_use]
    pub fn id(&self) -> String {
        track_id(&self.artist, &self.name)
    }

    /// Mood label for grouping and playlist naming. Tracks without a
    /// resolved mood report the explicit `"Unknown"` sentinel instead of
    /// an absent value.
    #[must_use]
    pub fn mood_label(&self) -> &str {
        self.mood.map_or("Unknown", Mood::as_str)
    }
}

/// Build the normalized track id for an (artist, title) pair.
#[must_use]
pub fn track_id(artist: &str, title: &str) -> String {
    format!("{artist} - {title}").trim().to_lowercase()
}

/// Extract a release year from a filesystem-style path.
///
/// The first path segment that is purely numeric and falls in
/// `[1900, 2100)` wins. Libraries organized as `.../2004/Artist/Song.mp3`
/// get a year signal for free; everything else yields `None`.
#[must_use]
pub fn year_from_path(location: &str) -> Option<i32> {
    location
        .split('/')
        .filter(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|part| part.parse::<i32>().ok())
        .find(|year| (1900..2100).contains(year))
}
