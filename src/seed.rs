//! # Seed Playlists
//!
//! Builds a playlist from a single seed song: ask the similarity source
//! for neighbors, keep the ones that actually exist in the library, score
//! them against the taste profile and emit the top slice as a mix.

use log::{info, warn};

use crate::assemble::Playlist;
use crate::profile::TasteProfile;
use crate::score::{score_track, sort_by_score, ScoreWeights};
use crate::tag_cache::TagMoodCache;
use crate::track::TrackRecord;

/// External supplier of (artist, title) pairs similar to a given song.
/// Implementations fail soft: any error becomes an empty list.
pub trait SimilarSource {
    fn fetch_similar(&self, artist: &str, title: &str, limit: usize) -> Vec<(String, String)>;
}

/// Split a `"Artist - Title"` seed string; a seed without the separator
/// falls back to first-word artist, rest title.
#[must_use]
pub fn parse_seed(seed: &str) -> (String, String) {
    if let Some((artist, title)) = seed.split_once(" - ") {
        return (artist.trim().to_string(), title.trim().to_string());
    }
    let mut words = seed.split_whitespace();
    let artist = words.next().unwrap_or_default().to_string();
    let title = words.collect::<Vec<_>>().join(" ");
    (artist, title)
}

/// Build a playlist seeded from one song, limited to library tracks.
///
/// Returns `None` when no similar track could be matched in the library;
/// the caller decides whether that is worth reporting.
#[must_use]
pub fn seed_playlist(
    seed: &str,
    library: &[TrackRecord],
    profile: &TasteProfile,
    cache: &TagMoodCache,
    weights: &ScoreWeights,
    source: &dyn SimilarSource,
    limit: usize,
) -> Option<Playlist> {
    let (artist, title) = parse_seed(seed);
    // Over-fetch so that misses against the library still leave enough.
    let similar = source.fetch_similar(&artist, &title, limit * 2);
    info!("Similarity source returned {} candidates for {artist} - {title}", similar.len());

    let mut matches: Vec<TrackRecord> = Vec::new();
    for (sim_artist, sim_title) in similar {
        let found = library.iter().find(|t| {
            t.artist.eq_ignore_ascii_case(&sim_artist) && t.name.eq_ignore_ascii_case(&sim_title)
        });
        if let Some(track) = found {
            if !matches.iter().any(|m| {
                m.artist.eq_ignore_ascii_case(&track.artist) && m.name.eq_ignore_ascii_case(&track.name)
            }) {
                matches.push(track.clone());
            }
        }
        if matches.len() >= limit {
            break;
        }
    }

    if matches.is_empty() {
        warn!("No similar tracks found in library for {artist} - {title}");
        return None;
    }

    for track in matches.iter_mut() {
        track.score = score_track(track, profile, cache, weights);
        track.mood = cache.mood_of(&track.id());
    }
    sort_by_score(&mut matches);
    matches.truncate(limit);

    Some(Playlist { label: format!("Seed Mix - {artist} - {title}"), tracks: matches })
}
