//! # Scoring Engine
//!
//! Combines the taste profile, the tag/mood cache and per-track metadata
//! into a single desirability score. The score is a plain weighted sum and
//! the function is pure: same inputs, same number, no side effects. Any
//! missing factor (no genre, no resolved mood, no extractable year, no
//! history) contributes zero instead of failing, so scoring never aborts a
//! run over patchy metadata.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::profile::TasteProfile;
use crate::tag_cache::TagMoodCache;
use crate::track::{year_from_path, TrackRecord};

/// Weights for each scoring factor.
///
/// The skip weight is negative on purpose: heavily skipped tracks are
/// actively suppressed, not merely unrewarded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub artist: f64,
    pub genre: f64,
    pub mood: f64,
    pub year: f64,
    pub play: f64,
    pub skip: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { artist: 2.0, genre: 1.0, mood: 1.0, year: 0.5, play: 2.0, skip: -3.0 }
    }
}

/// Score one track against the profile.
#[must_use]
pub fn score_track(
    track: &TrackRecord,
    profile: &TasteProfile,
    cache: &TagMoodCache,
    weights: &ScoreWeights,
) -> f64 {
    let id = track.id();

    let artist_score = profile.artist_scores.get(&track.artist).copied().unwrap_or(0.0);

    let genre_score = if track.genre.is_empty() {
        0.0
    } else {
        profile.genre_scores.get(&track.genre.to_lowercase()).copied().unwrap_or(0.0)
    };

    let mood_score = cache
        .mood_of(&id)
        .and_then(|mood| profile.mood_scores.get(mood.as_str()))
        .copied()
        .unwrap_or(0);

    let year_score = year_of(track)
        .and_then(|year| profile.year_scores.get(&year))
        .copied()
        .unwrap_or(0);

    let plays = f64::from(track.play_count) + f64::from(profile.plays_of(&id));
    let skips = f64::from(track.skip_count) + f64::from(profile.skips_of(&id));

    weights.artist * artist_score
        + weights.genre * genre_score
        + weights.mood * f64::from(mood_score)
        + weights.year * f64::from(year_score)
        + weights.play * plays
        + weights.skip * skips
}

/// Year for scoring and segmentation: the path segment heuristic first,
/// then whatever the library source supplied.
#[must_use]
pub fn year_of(track: &TrackRecord) -> Option<i32> {
    year_from_path(&track.location).or(track.year)
}

/// Score the whole library in place and annotate each track with its
/// best-effort mood (the cache's resolved mood, or nothing, which renders
/// as the `"Unknown"` sentinel downstream).
///
/// Logs a health summary; a library where more than 30% of tracks score
/// zero usually means the tag/mood cache never got built.
pub fn score_library(
    tracks: &mut [TrackRecord],
    profile: &TasteProfile,
    cache: &TagMoodCache,
    weights: &ScoreWeights,
) {
    info!("Scoring {} tracks", tracks.len());
    for track in tracks.iter_mut() {
        track.score = score_track(track, profile, cache, weights);
        track.mood = cache.mood_of(&track.id());
    }

    let positive = tracks.iter().filter(|t| t.score > 0.0).count();
    let zero = tracks.iter().filter(|t| t.score == 0.0).count();
    info!("Scoring complete: {positive} tracks scored >0, {zero} zero, of {} total", tracks.len());
    if zero * 10 > tracks.len() * 3 {
        warn!("More than 30% of tracks scored zero; check the tag/mood cache and profile");
    }
}

/// Sort a scored slice by descending score. Ties keep their relative order
/// so the total order downstream stages rely on is stable.
pub fn sort_by_score(tracks: &mut [TrackRecord]) {
    tracks.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mood::Mood;
    use crate::tag_cache::TagSource;
    use std::path::Path;

    struct CannedSource(Vec<String>);

    impl TagSource for CannedSource {
        fn fetch_tags(&self, _artist: &str, _title: &str) -> Vec<String> {
            self.0.clone()
        }
    }

    fn empty_cache() -> TagMoodCache {
        TagMoodCache::empty(Path::new("/nonexistent/cache.json"))
    }

    fn track(artist: &str, name: &str) -> TrackRecord {
        TrackRecord { artist: artist.into(), name: name.into(), ..Default::default() }
    }

    #[test]
    fn test_concrete_weighted_sum() {
        // artist_score=10, mood_score=5, local plays=2, skips=1:
        // 2*10 + 1*0 + 1*5 + 0.5*0 + 2*2 + (-3)*1 = 24
        let mut profile = TasteProfile::default();
        profile.artist_scores.insert("A".to_string(), 10.0);
        profile.mood_scores.insert("Happy".to_string(), 5);

        let source = CannedSource(vec!["happy".to_string()]);
        let mut cache = empty_cache();
        cache.resolve("A", "X", &source, None);

        let mut t = track("A", "X");
        t.play_count = 2;
        t.skip_count = 1;

        let score = score_track(&t, &profile, &cache, &ScoreWeights::default());
        assert!((score - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_everything_scores_zero() {
        let t = track("Nobody", "Nothing");
        let score = score_track(&t, &TasteProfile::default(), &empty_cache(), &ScoreWeights::default());
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_empty_genre_contributes_zero_even_when_profile_has_it() {
        let mut profile = TasteProfile::default();
        profile.genre_scores.insert("".to_string(), 100.0);
        let t = track("A", "X");
        let score = score_track(&t, &profile, &empty_cache(), &ScoreWeights::default());
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_history_plays_and_skips_combine_with_local_counts() {
        let mut profile = TasteProfile::default();
        profile.track_play_counts.insert("a - x".to_string(), 3);
        profile.track_skip_counts.insert("a - x".to_string(), 1);

        let mut t = track("A", "X");
        t.play_count = 2;

        // 2*(2+3) + (-3)*(0+1) = 7
        let score = score_track(&t, &profile, &empty_cache(), &ScoreWeights::default());
        assert!((score - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_year_from_path_feeds_year_score() {
        let mut profile = TasteProfile::default();
        profile.year_scores.insert(2004, 8);

        let mut t = track("A", "X");
        t.location = "/music/2004/a/x.mp3".to_string();

        // 0.5 * 8 = 4
        let score = score_track(&t, &profile, &empty_cache(), &ScoreWeights::default());
        assert!((score - 4.0).abs() < 1e-9);

        // Library-supplied year is the fallback when the path has none.
        t.location = "/music/a/x.mp3".to_string();
        t.year = Some(2004);
        let score = score_track(&t, &profile, &empty_cache(), &ScoreWeights::default());
        assert!((score - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_skips_suppress_below_zero() {
        let mut t = track("A", "X");
        t.skip_count = 5;
        let score = score_track(&t, &TasteProfile::default(), &empty_cache(), &ScoreWeights::default());
        assert_eq!(score, -15.0);
    }

    #[test]
    fn test_score_library_annotates_mood_with_unknown_fallback() {
        let source = CannedSource(vec!["somber".to_string()]);
        let mut cache = empty_cache();
        cache.resolve("A", "X", &source, None);

        let mut tracks = vec![track("A", "X"), track("B", "Y")];
        score_library(&mut tracks, &TasteProfile::default(), &cache, &ScoreWeights::default());

        assert_eq!(tracks[0].mood, Some(Mood::Sad));
        assert_eq!(tracks[0].mood_label(), "Sad");
        assert_eq!(tracks[1].mood, None);
        assert_eq!(tracks[1].mood_label(), "Unknown");
    }

    #[test]
    fn test_sort_by_score_descending() {
        let mut tracks = vec![track("A", "X"), track("B", "Y"), track("C", "Z")];
        tracks[0].score = 1.0;
        tracks[1].score = 5.0;
        tracks[2].score = 3.0;
        sort_by_score(&mut tracks);
        let names: Vec<&str> = tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Y", "Z", "X"]);
    }
}
