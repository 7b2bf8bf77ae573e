//! # Segmenter
//!
//! Partitions the scored library into candidate playlists. Strategies are
//! tried in a fixed cascade and the first one that produces a non-empty
//! result wins; every stage logs and falls through instead of erroring:
//!
//! 1. mood grouping (exact mood value, no size floor),
//! 2. year grouping (fixed-width windows or exact years, with a minimum
//!    tracks-per-bucket floor so tiny buckets never become playlists),
//! 3. feature clustering (TF-IDF over genre/name/artist/mood text, k-means
//!    with a fixed cluster count or density clustering without one),
//! 4. a round-robin deal of the score-sorted library, which always
//!    succeeds on non-empty input.
//!
//! Each strategy is a pure function returning `Option<Vec<Cluster>>`, which
//! keeps the cascade flat and every stage independently testable.

use std::collections::{BTreeMap, HashMap};

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;

use crate::score::{sort_by_score, year_of};
use crate::track::TrackRecord;

/// Fixed seed for feature clustering, so identical inputs produce
/// identical partitions.
const CLUSTER_SEED: u64 = 42;

/// Cap on the TF-IDF vocabulary size.
const MAX_FEATURES: usize = 1000;

const KMEANS_MAX_ITERS: usize = 100;

/// Minimum cluster size for the density clusterer.
const DENSITY_MIN_POINTS: usize = 10;

/// Cosine-distance neighborhood radius for the density clusterer.
const DENSITY_EPS: f64 = 0.35;

/// Segmentation options, mirroring the run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentOptions {
    /// Group by exact mood value first.
    pub by_mood: bool,
    /// Group by year (windows of `year_range`, or exact years when 0).
    pub by_year: bool,
    pub year_range: i32,
    /// Floor below which a year bucket is not worth a playlist.
    pub min_tracks_per_year: usize,
    /// Cluster count for k-means and the round-robin deal.
    pub cluster_count: usize,
    /// Use the density clusterer (no preset count) instead of k-means.
    pub density: bool,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            by_mood: false,
            by_year: true,
            year_range: 1,
            min_tracks_per_year: 10,
            cluster_count: 6,
            density: false,
        }
    }
}

/// An ordered group of tracks sharing one segmentation criterion.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// What formed this cluster ("mood", "year", "features", "deal").
    pub criterion: &'static str,
    pub tracks: Vec<TrackRecord>,
}

impl Cluster {
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

type Strategy = fn(&[TrackRecord], &SegmentOptions) -> Option<Vec<Cluster>>;

/// Run the cascade. Only an empty input yields an empty result; the final
/// deal strategy partitions anything else.
#[must_use]
pub fn segment(tracks: &[TrackRecord], opts: &SegmentOptions) -> Vec<Cluster> {
    if tracks.is_empty() {
        return Vec::new();
    }

    let strategies: [(&str, Strategy); 4] = [
        ("mood", by_mood),
        ("year", by_year),
        ("features", by_features),
        ("deal", by_deal),
    ];

    for (name, strategy) in strategies {
        if let Some(clusters) = strategy(tracks, opts) {
            if !clusters.is_empty() {
                let sizes: Vec<usize> = clusters.iter().map(Cluster::len).collect();
                info!("Generated {} {name}-based clusters: {sizes:?}", clusters.len());
                return clusters;
            }
        }
    }

    Vec::new()
}

/// Stage 1: one cluster per exact mood value, no size floor. Applies only
/// when at least one track carries a resolved mood; the `"Unknown"`
/// sentinel then forms its own group.
fn by_mood(tracks: &[TrackRecord], opts: &SegmentOptions) -> Option<Vec<Cluster>> {
    if !opts.by_mood {
        return None;
    }
    if tracks.iter().all(|t| t.mood.is_none()) {
        warn!("Mood grouping enabled but no track has a resolved mood; falling through");
        return None;
    }

    let mut groups: BTreeMap<&str, Vec<TrackRecord>> = BTreeMap::new();
    for track in tracks {
        groups.entry(track.mood_label()).or_default().push(track.clone());
    }
    Some(groups.into_values().map(|tracks| Cluster { criterion: "mood", tracks }).collect())
}

/// Stage 2: contiguous half-open year windows `[start, start+range)` swept
/// from the minimum to the maximum observed year, or exact years when no
/// range is configured. Buckets below the floor are discarded.
fn by_year(tracks: &[TrackRecord], opts: &SegmentOptions) -> Option<Vec<Cluster>> {
    if !opts.by_year {
        return None;
    }

    let dated: Vec<(i32, &TrackRecord)> =
        tracks.iter().filter_map(|t| year_of(t).map(|y| (y, t))).collect();
    if dated.is_empty() {
        warn!("Year grouping enabled but no valid year data found; falling through");
        return None;
    }

    let mut clusters = Vec::new();
    if opts.year_range > 0 {
        let min_year = dated.iter().map(|(y, _)| *y).min().unwrap_or(0);
        let max_year = dated.iter().map(|(y, _)| *y).max().unwrap_or(0);
        let mut start = min_year;
        while start <= max_year {
            let end = start + opts.year_range;
            let bucket: Vec<TrackRecord> = dated
                .iter()
                .filter(|(y, _)| (start..end).contains(y))
                .map(|(_, t)| (*t).clone())
                .collect();
            if bucket.len() >= opts.min_tracks_per_year {
                clusters.push(Cluster { criterion: "year", tracks: bucket });
            }
            start += opts.year_range;
        }
    } else {
        let mut groups: BTreeMap<i32, Vec<TrackRecord>> = BTreeMap::new();
        for (year, track) in &dated {
            groups.entry(*year).or_default().push((*track).clone());
        }
        for (_, bucket) in groups {
            if bucket.len() >= opts.min_tracks_per_year {
                clusters.push(Cluster { criterion: "year", tracks: bucket });
            }
        }
    }

    if clusters.is_empty() {
        warn!("No year bucket reached {} tracks; falling through", opts.min_tracks_per_year);
        return None;
    }
    Some(clusters)
}

/// Stage 3: TF-IDF feature vectors clustered by k-means (fixed count,
/// seeded) or by the density clusterer (no preset count).
fn by_features(tracks: &[TrackRecord], opts: &SegmentOptions) -> Option<Vec<Cluster>> {
    let vectors = tfidf_vectors(tracks)?;

    let labels: Vec<i64> = if opts.density {
        density_cluster(&vectors, DENSITY_EPS, DENSITY_MIN_POINTS)
    } else {
        let mut rng = StdRng::seed_from_u64(CLUSTER_SEED);
        kmeans(&vectors, opts.cluster_count, &mut rng).into_iter().map(|l| l as i64).collect()
    };

    let mut groups: BTreeMap<i64, Vec<TrackRecord>> = BTreeMap::new();
    for (label, track) in labels.iter().zip(tracks) {
        groups.entry(*label).or_default().push(track.clone());
    }
    Some(groups.into_values().map(|tracks| Cluster { criterion: "features", tracks }).collect())
}

/// Stage 4: sort by score descending and deal round-robin into
/// `cluster_count` near-equal groups. Never fails on non-empty input.
fn by_deal(tracks: &[TrackRecord], opts: &SegmentOptions) -> Option<Vec<Cluster>> {
    warn!("Falling back to round-robin deal into {} groups", opts.cluster_count);
    let mut sorted: Vec<TrackRecord> = tracks.to_vec();
    sort_by_score(&mut sorted);

    let n = opts.cluster_count.max(1);
    let mut groups: Vec<Vec<TrackRecord>> = vec![Vec::new(); n];
    for (i, track) in sorted.into_iter().enumerate() {
        groups[i % n].push(track);
    }
    Some(
        groups
            .into_iter()
            .filter(|g| !g.is_empty())
            .map(|tracks| Cluster { criterion: "deal", tracks })
            .collect(),
    )
}

/// Human-readable label for a cluster: modal mood adjective plus modal
/// genre, degrading to a single term and finally an index-based name.
#[must_use]
pub fn name_cluster(cluster: &Cluster, index: usize) -> String {
    let mood = modal(cluster.tracks.iter().filter_map(|t| t.mood.map(|m| m.adjective())));
    let genre = modal(cluster.tracks.iter().map(|t| t.genre.as_str()).filter(|g| !g.is_empty()));

    match (mood, genre) {
        (Some(mood), Some(genre)) => format!("{mood} {genre}"),
        (None, Some(genre)) => genre.to_string(),
        (Some(mood), None) => mood.to_string(),
        (None, None) => format!("Cluster {}", index + 1),
    }
}

/// Most frequent value; ties resolve alphabetically so naming is stable.
fn modal<'a, I: Iterator<Item = &'a str>>(values: I) -> Option<&'a str> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    let mut counts: Vec<(&str, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    counts.first().map(|(value, _)| *value)
}

/// Per-track text feature: genre, name, artist and mood label concatenated,
/// vectorized with a shared TF-IDF transform and L2-normalized. Returns
/// `None` when the corpus yields no vocabulary at all.
fn tfidf_vectors(tracks: &[TrackRecord]) -> Option<Vec<Vec<f64>>> {
    let docs: Vec<Vec<String>> = tracks
        .iter()
        .map(|t| {
            let mood = t.mood.map(|m| m.as_str()).unwrap_or("");
            tokenize(&format!("{} {} {} {}", t.genre, t.name, t.artist, mood))
        })
        .collect();

    // Document frequency and total term frequency over the corpus.
    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    let mut term_freq: HashMap<&str, usize> = HashMap::new();
    for doc in &docs {
        let mut seen: Vec<&str> = Vec::new();
        for term in doc {
            *term_freq.entry(term).or_insert(0) += 1;
            if !seen.contains(&term.as_str()) {
                seen.push(term);
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }
    }
    if term_freq.is_empty() {
        return None;
    }

    // Keep the most frequent terms when the vocabulary overflows the cap.
    let mut terms: Vec<(&str, usize)> = term_freq.iter().map(|(t, c)| (*t, *c)).collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    terms.truncate(MAX_FEATURES);
    let mut vocab: Vec<&str> = terms.into_iter().map(|(t, _)| t).collect();
    vocab.sort_unstable();
    let index: HashMap<&str, usize> = vocab.iter().enumerate().map(|(i, t)| (*t, i)).collect();

    let n_docs = docs.len() as f64;
    let vectors = docs
        .iter()
        .map(|doc| {
            let mut vector = vec![0.0f64; vocab.len()];
            for term in doc {
                if let Some(&i) = index.get(term.as_str()) {
                    vector[i] += 1.0;
                }
            }
            for (i, value) in vector.iter_mut().enumerate() {
                if *value > 0.0 {
                    let df = doc_freq[vocab[i]] as f64;
                    let idf = ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0;
                    *value *= idf;
                }
            }
            normalize(&mut vector);
            vector
        })
        .collect();

    Some(vectors)
}

/// Lowercased alphanumeric tokens of at least two characters.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

fn normalize(vector: &mut [f64]) {
    let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Plain Lloyd's k-means over the normalized vectors. Empty clusters are
/// reseeded from the data; iteration stops when assignments stabilize.
fn kmeans(vectors: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<usize> {
    let k = k.clamp(1, vectors.len());
    let dim = vectors[0].len();

    let mut centroids: Vec<Vec<f64>> =
        sample(rng, vectors.len(), k).into_iter().map(|i| vectors[i].clone()).collect();
    let mut labels = vec![0usize; vectors.len()];

    for _ in 0..KMEANS_MAX_ITERS {
        let mut changed = false;
        for (i, vector) in vectors.iter().enumerate() {
            let nearest = centroids
                .iter()
                .enumerate()
                .map(|(j, c)| (j, squared_distance(vector, c)))
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(j, _)| j)
                .unwrap_or(0);
            if labels[i] != nearest {
                labels[i] = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![vec![0.0f64; dim]; k];
        let mut counts = vec![0usize; k];
        for (label, vector) in labels.iter().zip(vectors) {
            counts[*label] += 1;
            for (s, v) in sums[*label].iter_mut().zip(vector) {
                *s += v;
            }
        }
        for (j, (sum, count)) in sums.into_iter().zip(&counts).enumerate() {
            if *count == 0 {
                let i = sample(rng, vectors.len(), 1).index(0);
                centroids[j] = vectors[i].clone();
            } else {
                centroids[j] = sum.into_iter().map(|s| s / *count as f64).collect();
            }
        }
    }

    labels
}

/// Classic density clustering (DBSCAN) on cosine distance. Points that end
/// up in no dense region share the `-1` label, which downstream becomes its
/// own cluster like any other.
fn density_cluster(vectors: &[Vec<f64>], eps: f64, min_points: usize) -> Vec<i64> {
    const UNVISITED: i64 = -2;
    const NOISE: i64 = -1;

    let n = vectors.len();
    let mut labels = vec![UNVISITED; n];
    let mut cluster = 0i64;

    let neighbors = |i: usize| -> Vec<usize> {
        (0..n)
            .filter(|&j| {
                let dot: f64 = vectors[i].iter().zip(&vectors[j]).map(|(a, b)| a * b).sum();
                1.0 - dot <= eps
            })
            .collect()
    };

    for i in 0..n {
        if labels[i] != UNVISITED {
            continue;
        }
        let seeds = neighbors(i);
        if seeds.len() < min_points {
            labels[i] = NOISE;
            continue;
        }

        labels[i] = cluster;
        let mut queue = seeds;
        let mut qi = 0;
        while qi < queue.len() {
            let j = queue[qi];
            qi += 1;
            if labels[j] == NOISE {
                labels[j] = cluster;
            }
            if labels[j] != UNVISITED {
                continue;
            }
            labels[j] = cluster;
            let reachable = neighbors(j);
            if reachable.len() >= min_points {
                queue.extend(reachable);
            }
        }
        cluster += 1;
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mood::Mood;

    fn track(artist: &str, name: &str, genre: &str, mood: Option<Mood>) -> TrackRecord {
        TrackRecord {
            artist: artist.into(),
            name: name.into(),
            genre: genre.into(),
            mood,
            ..Default::default()
        }
    }

    fn moody_library() -> Vec<TrackRecord> {
        let moods = [Mood::Happy, Mood::Sad, Mood::Chill];
        (0..30)
            .map(|i| {
                track(
                    &format!("Artist {}", i % 10),
                    &format!("Song {i}"),
                    "Rock",
                    Some(moods[i % 3]),
                )
            })
            .collect()
    }

    #[test]
    fn test_mood_grouping_wins_without_fallthrough() {
        let tracks = moody_library();
        let opts = SegmentOptions { by_mood: true, ..Default::default() };
        let clusters = segment(&tracks, &opts);

        assert_eq!(clusters.len(), 3);
        assert!(clusters.iter().all(|c| c.criterion == "mood"));
        // Every cluster is mood-homogeneous.
        for cluster in &clusters {
            let first = cluster.tracks[0].mood_label();
            assert!(cluster.tracks.iter().all(|t| t.mood_label() == first));
        }
        assert_eq!(clusters.iter().map(Cluster::len).sum::<usize>(), 30);
    }

    #[test]
    fn test_mood_grouping_keeps_unknown_as_its_own_group() {
        let mut tracks = moody_library();
        tracks[0].mood = None;
        let opts = SegmentOptions { by_mood: true, ..Default::default() };
        let clusters = segment(&tracks, &opts);
        assert_eq!(clusters.len(), 4);
    }

    #[test]
    fn test_mood_grouping_skipped_when_no_moods_resolved() {
        // Single-character names and artists carry no text features either,
        // so the cascade runs all the way to the deal stage.
        let tracks: Vec<TrackRecord> =
            (0..10).map(|i| track("A", &i.to_string(), "", None)).collect();
        let opts = SegmentOptions {
            by_mood: true,
            by_year: false,
            cluster_count: 3,
            ..Default::default()
        };
        // No moods, no years, no text features: ends at the deal stage.
        let clusters = segment(&tracks, &opts);
        assert!(clusters.iter().all(|c| c.criterion == "deal"));
    }

    #[test]
    fn test_year_windows_are_half_open() {
        let mut tracks = Vec::new();
        for year in [2000, 2000, 2001, 2001, 2002, 2002] {
            for i in 0..2 {
                let mut t = track("A", &format!("S{year}-{i}"), "", None);
                t.location = format!("/music/{year}/s.mp3");
                tracks.push(t);
            }
        }
        let opts = SegmentOptions {
            by_mood: false,
            by_year: true,
            year_range: 2,
            min_tracks_per_year: 2,
            ..Default::default()
        };
        let clusters = segment(&tracks, &opts);

        // [2000, 2002) holds 8 tracks, [2002, 2004) holds 4.
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].len(), 8);
        assert_eq!(clusters[1].len(), 4);
    }

    #[test]
    fn test_year_floor_discards_thin_buckets() {
        let mut tracks = Vec::new();
        for i in 0..12 {
            let mut t = track("A", &format!("S{i}"), "", None);
            t.year = Some(2000);
            tracks.push(t);
        }
        let mut lone = track("A", "Loner", "", None);
        lone.year = Some(1990);
        tracks.push(lone);

        let opts = SegmentOptions {
            by_mood: false,
            by_year: true,
            year_range: 0,
            min_tracks_per_year: 10,
            ..Default::default()
        };
        let clusters = segment(&tracks, &opts);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 12);
    }

    #[test]
    fn test_feature_clustering_partitions_all_tracks() {
        let mut tracks = Vec::new();
        for i in 0..10 {
            tracks.push(track(&format!("Country Artist {i}"), &format!("Dusty Road {i}"), "Country", None));
        }
        for i in 0..10 {
            tracks.push(track(&format!("Techno Artist {i}"), &format!("Neon Pulse {i}"), "Techno", None));
        }
        let opts = SegmentOptions {
            by_mood: false,
            by_year: false,
            cluster_count: 2,
            ..Default::default()
        };
        let clusters = segment(&tracks, &opts);

        assert!(clusters.iter().all(|c| c.criterion == "features"));
        assert_eq!(clusters.iter().map(Cluster::len).sum::<usize>(), 20);
        assert!(!clusters.is_empty() && clusters.len() <= 2);
    }

    #[test]
    fn test_feature_clustering_is_deterministic() {
        let tracks: Vec<TrackRecord> = (0..20)
            .map(|i| track(&format!("Artist {}", i % 4), &format!("Song {i}"), "Pop", None))
            .collect();
        let opts = SegmentOptions { by_mood: false, by_year: false, ..Default::default() };

        let a: Vec<usize> = segment(&tracks, &opts).iter().map(Cluster::len).collect();
        let b: Vec<usize> = segment(&tracks, &opts).iter().map(Cluster::len).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_deal_fallback_covers_everything() {
        // Single-character names tokenize to nothing, so the feature stage
        // has no vocabulary and the deal takes over.
        let mut tracks: Vec<TrackRecord> =
            (0..10).map(|i| track("A", &i.to_string(), "", None)).collect();
        for (i, t) in tracks.iter_mut().enumerate() {
            t.score = i as f64;
        }
        let opts = SegmentOptions {
            by_mood: false,
            by_year: false,
            cluster_count: 3,
            ..Default::default()
        };
        let clusters = segment(&tracks, &opts);

        assert!(clusters.iter().all(|c| c.criterion == "deal"));
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters.iter().map(Cluster::len).sum::<usize>(), 10);
        // Sizes stay within one of each other.
        let max = clusters.iter().map(Cluster::len).max().unwrap();
        let min = clusters.iter().map(Cluster::len).min().unwrap();
        assert!(max - min <= 1);
    }

    #[test]
    fn test_empty_input_yields_no_clusters() {
        assert!(segment(&[], &SegmentOptions::default()).is_empty());
    }

    #[test]
    fn test_name_cluster_combines_mood_and_genre() {
        let cluster = Cluster {
            criterion: "mood",
            tracks: vec![
                track("A", "X", "Country", Some(Mood::Sad)),
                track("B", "Y", "Country", Some(Mood::Sad)),
                track("C", "Z", "Folk", Some(Mood::Happy)),
            ],
        };
        assert_eq!(name_cluster(&cluster, 0), "Melancholic Country");
    }

    #[test]
    fn test_name_cluster_degrades_gracefully() {
        let genre_only = Cluster {
            criterion: "features",
            tracks: vec![track("A", "X", "Jazz", None)],
        };
        assert_eq!(name_cluster(&genre_only, 0), "Jazz");

        let mood_only = Cluster {
            criterion: "mood",
            tracks: vec![track("A", "X", "", Some(Mood::Chill))],
        };
        assert_eq!(name_cluster(&mood_only, 0), "Chill");

        let bare = Cluster { criterion: "deal", tracks: vec![track("A", "X", "", None)] };
        assert_eq!(name_cluster(&bare, 4), "Cluster 5");
    }

    #[test]
    fn test_density_clustering_labels_sparse_points_as_noise() {
        // Ten identical vectors form a dense region; one orthogonal vector
        // stays noise and becomes its own group.
        let mut vectors = vec![vec![1.0, 0.0]; 10];
        vectors.push(vec![0.0, 1.0]);
        let labels = density_cluster(&vectors, 0.35, 10);
        assert!(labels[..10].iter().all(|&l| l == 0));
        assert_eq!(labels[10], -1);
    }
}
