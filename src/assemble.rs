//! # Playlist Assembler
//!
//! Turns one cluster into a bounded, deduplicated, diversified track list:
//! sort by score, cap each artist, fill from the global pool when the
//! cluster runs short, dedupe, then interleave across artists so one
//! prolific artist does not monopolize a stretch of the playlist.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::Result;
use crate::segment::Cluster;
use crate::track::TrackRecord;

/// The terminal artifact: an ordered, labeled track sequence.
#[derive(Debug, Clone)]
pub struct Playlist {
    pub label: String,
    pub tracks: Vec<TrackRecord>,
}

impl Playlist {
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Accepts finished playlists; responsible for on-disk format and naming.
pub trait PlaylistSink {
    fn emit(&self, playlist: &Playlist) -> Result<()>;
}

/// Assemble a playlist from one cluster.
///
/// The fill step draws randomly from `global_pool`, excluding tracks
/// already selected, duplicate `(artist, name)` pairs, and artists that
/// already sit at the cap. When the pool runs out of eligible tracks the
/// playlist simply comes out short; a non-empty cluster always yields a
/// non-empty playlist.
#[must_use]
pub fn assemble<R: Rng>(
    cluster: &Cluster,
    label: &str,
    global_pool: &[TrackRecord],
    max_tracks: usize,
    max_per_artist: usize,
    rng: &mut R,
) -> Playlist {
    let mut selected: Vec<TrackRecord> = cluster.tracks.clone();
    selected.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    // Per-artist head-take: the best-scored tracks of each artist survive.
    let mut per_artist: HashMap<String, usize> = HashMap::new();
    selected.retain(|track| {
        let count = per_artist.entry(track.artist.to_lowercase()).or_insert(0);
        *count += 1;
        *count <= max_per_artist
    });

    if selected.len() < max_tracks {
        fill_from_pool(&mut selected, global_pool, max_tracks, max_per_artist, rng);
    } else {
        selected.truncate(max_tracks);
    }

    dedupe(&mut selected);
    let tracks = interleave(selected);

    debug!("Assembled playlist '{label}' with {} tracks", tracks.len());
    Playlist { label: label.to_string(), tracks }
}

/// Randomized fill from the leftover pool, honoring the artist cap and the
/// duplicate exclusion against everything already selected.
fn fill_from_pool<R: Rng>(
    selected: &mut Vec<TrackRecord>,
    global_pool: &[TrackRecord],
    max_tracks: usize,
    max_per_artist: usize,
    rng: &mut R,
) {
    let need = max_tracks - selected.len();

    let mut artist_counts: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<(String, String)> = HashSet::new();
    for track in selected.iter() {
        *artist_counts.entry(track.artist.to_lowercase()).or_insert(0) += 1;
        taken.insert(pair_key(track));
    }

    let mut eligible: Vec<&TrackRecord> = Vec::new();
    for track in global_pool {
        let key = pair_key(track);
        if taken.contains(&key) {
            continue;
        }
        if artist_counts.get(&track.artist.to_lowercase()).copied().unwrap_or(0) >= max_per_artist {
            continue;
        }
        taken.insert(key);
        eligible.push(track);
    }

    if eligible.is_empty() {
        return;
    }

    // Sample without replacement, but keep enforcing the cap as picks land:
    // two fills from the same artist must not blow past the limit.
    eligible.shuffle(rng);
    let mut added = 0;
    for track in eligible {
        if added >= need {
            break;
        }
        let count = artist_counts.entry(track.artist.to_lowercase()).or_insert(0);
        if *count >= max_per_artist {
            continue;
        }
        *count += 1;
        selected.push(track.clone());
        added += 1;
    }
}

/// Drop later duplicates of the same `(artist, name)` pair.
fn dedupe(tracks: &mut Vec<TrackRecord>) {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    tracks.retain(|track| seen.insert(pair_key(track)));
}

/// Round-robin interleave across artist groups, largest group first. Each
/// artist's own tracks keep their score order; exhausted groups are
/// skipped.
fn interleave(tracks: Vec<TrackRecord>) -> Vec<TrackRecord> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<TrackRecord>> = HashMap::new();
    for track in tracks {
        let key = track.artist.to_lowercase();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(track);
    }

    // Stable sort: equal-sized groups keep first-appearance order.
    order.sort_by_key(|artist| std::cmp::Reverse(groups[artist].len()));

    let mut lanes: Vec<std::vec::IntoIter<TrackRecord>> =
        order.iter().map(|artist| groups.remove(artist).unwrap().into_iter()).collect();

    let mut result = Vec::new();
    loop {
        let mut exhausted = true;
        for lane in lanes.iter_mut() {
            if let Some(track) = lane.next() {
                result.push(track);
                exhausted = false;
            }
        }
        if exhausted {
            break;
        }
    }
    result
}

fn pair_key(track: &TrackRecord) -> (String, String) {
    (track.artist.to_lowercase(), track.name.to_lowercase())
}

/// M3U sink: one `.m3u` file per playlist under the output directory.
pub struct M3uSink {
    out_dir: PathBuf,
}

impl M3uSink {
    pub fn new<P: Into<PathBuf>>(out_dir: P) -> Self {
        Self { out_dir: out_dir.into() }
    }
}

impl PlaylistSink for M3uSink {
    fn emit(&self, playlist: &Playlist) -> Result<()> {
        fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(format!("{}.m3u", sanitize_label(&playlist.label)));

        let mut body = String::from("#EXTM3U\n");
        for track in &playlist.tracks {
            // A track without a location cannot be played from a file; it
            // is dropped from the file but stays in the in-memory playlist.
            if track.location.trim().is_empty() {
                continue;
            }
            body.push_str(&format!("#EXTINF:-1,{} - {}\n{}\n", track.artist, track.name, track.location));
        }
        fs::write(&path, body)?;
        info!("Saved playlist '{}' ({} tracks) to {}", playlist.label, playlist.len(), path.display());
        Ok(())
    }
}

/// Make a playlist label safe for use as a file name.
#[must_use]
pub fn sanitize_label(label: &str) -> String {
    let mut out = label.replace(['/', '\\'], " - ");
    out.retain(|c| !matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*'));
    out.split_whitespace().collect::<Vec<_>>().join(" ").trim_end_matches(['&', ' ']).trim().to_string()
}

/// Console sink used by dry runs: prints labels and lengths only.
pub struct LogSink;

impl PlaylistSink for LogSink {
    fn emit(&self, playlist: &Playlist) -> Result<()> {
        info!("Playlist '{}' with {} tracks", playlist.label, playlist.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn track(artist: &str, name: &str, score: f64) -> TrackRecord {
        TrackRecord {
            artist: artist.into(),
            name: name.into(),
            location: format!("/music/{artist}/{name}.mp3"),
            score,
            ..Default::default()
        }
    }

    fn cluster(tracks: Vec<TrackRecord>) -> Cluster {
        Cluster { criterion: "mood", tracks }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_artist_cap_is_never_exceeded() {
        let tracks: Vec<TrackRecord> =
            (0..10).map(|i| track("Prolific", &format!("Song {i}"), i as f64)).collect();
        let playlist = assemble(&cluster(tracks), "Mix", &[], 20, 3, &mut rng());

        assert_eq!(playlist.len(), 3);
        // The cap keeps the best-scored tracks.
        let names: Vec<&str> = playlist.tracks.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"Song 9"));
        assert!(names.contains(&"Song 8"));
        assert!(names.contains(&"Song 7"));
    }

    #[test]
    fn test_fill_respects_cap_and_duplicates() {
        let cluster_tracks = vec![track("A", "X", 5.0)];
        let pool = vec![
            track("A", "X", 5.0),  // duplicate of the selection
            track("A", "Y", 4.0),  // same artist, still under cap
            track("A", "Z", 3.0),
            track("A", "W", 2.0),  // would exceed the cap of 2
            track("B", "P", 1.0),
        ];
        let playlist = assemble(&cluster(cluster_tracks), "Mix", &pool, 10, 2, &mut rng());

        let a_count = playlist.tracks.iter().filter(|t| t.artist == "A").count();
        assert_eq!(a_count, 2);
        assert!(playlist.tracks.iter().any(|t| t.artist == "B"));
        // Pool exhausted below the target: 2 from A + 1 from B.
        assert_eq!(playlist.len(), 3);
    }

    #[test]
    fn test_no_duplicate_pairs_in_output() {
        let tracks = vec![
            track("A", "X", 3.0),
            track("a", "x", 2.0),
            track("A", "Y", 1.0),
        ];
        let playlist = assemble(&cluster(tracks), "Mix", &[], 10, 5, &mut rng());
        assert_eq!(playlist.len(), 2);
    }

    #[test]
    fn test_truncates_to_max_tracks() {
        let tracks: Vec<TrackRecord> =
            (0..30).map(|i| track(&format!("Artist {i}"), "Song", i as f64)).collect();
        let playlist = assemble(&cluster(tracks), "Mix", &[], 10, 5, &mut rng());
        assert_eq!(playlist.len(), 10);
    }

    #[test]
    fn test_reaches_target_when_pool_allows() {
        let cluster_tracks: Vec<TrackRecord> =
            (0..3).map(|i| track(&format!("C{i}"), "Song", 5.0)).collect();
        let pool: Vec<TrackRecord> =
            (0..40).map(|i| track(&format!("P{i}"), "Song", 1.0)).collect();
        let playlist = assemble(&cluster(cluster_tracks), "Mix", &pool, 20, 2, &mut rng());
        assert_eq!(playlist.len(), 20);
    }

    #[test]
    fn test_interleave_spreads_prolific_artists() {
        let tracks = vec![
            track("A", "A1", 9.0),
            track("A", "A2", 8.0),
            track("A", "A3", 7.0),
            track("B", "B1", 6.0),
            track("B", "B2", 5.0),
            track("C", "C1", 4.0),
        ];
        let playlist = assemble(&cluster(tracks), "Mix", &[], 10, 5, &mut rng());

        let artists: Vec<&str> = playlist.tracks.iter().map(|t| t.artist.as_str()).collect();
        // Largest group leads each round; exhausted groups drop out.
        assert_eq!(artists, vec!["A", "B", "C", "A", "B", "A"]);
        // Within A, score order is preserved.
        let a_names: Vec<&str> =
            playlist.tracks.iter().filter(|t| t.artist == "A").map(|t| t.name.as_str()).collect();
        assert_eq!(a_names, vec!["A1", "A2", "A3"]);
    }

    #[test]
    fn test_non_empty_cluster_never_yields_empty_playlist() {
        let playlist = assemble(&cluster(vec![track("A", "X", 0.0)]), "Mix", &[], 5, 1, &mut rng());
        assert_eq!(playlist.len(), 1);
    }

    #[test]
    fn test_m3u_sink_skips_missing_locations() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut no_location = track("B", "Y", 1.0);
        no_location.location = String::new();
        let playlist = Playlist {
            label: "Chill / Test?".to_string(),
            tracks: vec![track("A", "X", 2.0), no_location],
        };

        M3uSink::new(dir.path()).emit(&playlist).unwrap();
        let body = fs::read_to_string(dir.path().join("Chill - Test.m3u")).unwrap();
        assert!(body.starts_with("#EXTM3U"));
        assert!(body.contains("A - X"));
        assert!(!body.contains("B - Y"));
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("Moody/Blue"), "Moody - Blue");
        assert_eq!(sanitize_label("What? <Why> *Now*"), "What Why Now");
        assert_eq!(sanitize_label("  spaced   out &"), "spaced out");
    }
}
