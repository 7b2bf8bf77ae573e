//! # Pipeline
//!
//! Runs the stages in dependency order: tag/mood cache, taste profile,
//! scoring, segmentation, assembly, sink. Stages execute strictly one
//! after another; the only internal parallelism is the bounded fetch pool
//! inside the cache stage. The pipeline is safely interruptible between
//! cache checkpoints and between stages.

use log::{info, warn};
use rand::seq::SliceRandom;

use crate::assemble::{assemble, Playlist, PlaylistSink};
use crate::config::Config;
use crate::error::{MixgenError, Result};
use crate::library::LibrarySource;
use crate::profile::{load_history_events, TasteProfile};
use crate::score::{score_library, ScoreWeights};
use crate::seed::{seed_playlist, SimilarSource};
use crate::segment::{name_cluster, segment};
use crate::tag_cache::{TagMoodCache, TagSource, TagStore};
use crate::track::TrackRecord;

/// Optional restrictions applied to the scored library before segmentation.
#[derive(Debug, Clone, Default)]
pub struct RunFilters {
    pub genre: Option<String>,
    pub mood: Option<String>,
}

/// Full pipeline run. Returns the emitted playlists.
pub fn run(
    config: &Config,
    library: &dyn LibrarySource,
    tag_source: &dyn TagSource,
    sink: &dyn PlaylistSink,
    filters: &RunFilters,
) -> Result<Vec<Playlist>> {
    info!("Starting playlist generation pipeline");

    let mut tracks = library.load()?;
    let events = load_history_events(&config.history_dir)?;

    let store = TagStore::open(&config.cache_db)?;
    let mut cache = TagMoodCache::load(&config.tag_mood_cache);
    let pairs = cache_pairs(&tracks, &events);
    cache.batch_resolve(&pairs, tag_source, Some(&store), config.mood_concurrency)?;

    let profile = TasteProfile::build(&events, &cache);
    profile.save(&config.profile_path)?;

    score_library(&mut tracks, &profile, &cache, &ScoreWeights::default());
    let tracks = apply_filters(tracks, filters);

    let mut clusters = segment(&tracks, &config.segment_options());
    if clusters.is_empty() {
        return Err(MixgenError::EmptySegmentation);
    }

    // Shuffle for variety across runs, then cap to the configured count.
    let mut rng = rand::thread_rng();
    clusters.shuffle(&mut rng);
    clusters.truncate(config.num_playlists.unwrap_or(clusters.len()));

    let mut playlists = Vec::with_capacity(clusters.len());
    for (i, cluster) in clusters.iter().enumerate() {
        let label = name_cluster(cluster, i);
        let playlist = assemble(
            cluster,
            &label,
            &tracks,
            config.tracks_per_mix,
            config.max_per_artist,
            &mut rng,
        );
        info!("Playlist '{}' built with {} tracks", playlist.label, playlist.len());
        sink.emit(&playlist)?;
        playlists.push(playlist);
    }
    Ok(playlists)
}

/// Build (or extend) the tag/mood cache from every track the library and
/// the play history know about. Returns `(processed, skipped)`.
pub fn build_cache(
    config: &Config,
    library: &dyn LibrarySource,
    tag_source: &dyn TagSource,
) -> Result<(usize, usize)> {
    let tracks = library.load()?;
    // History is optional here: a cache built from the library alone is
    // still useful.
    let events = match load_history_events(&config.history_dir) {
        Ok(events) => events,
        Err(MixgenError::NoHistory(dir)) => {
            warn!("No history files in {}; caching library tracks only", dir.display());
            Vec::new()
        }
        Err(err) => return Err(err),
    };

    let store = TagStore::open(&config.cache_db)?;
    let mut cache = TagMoodCache::load(&config.tag_mood_cache);
    let pairs = cache_pairs(&tracks, &events);
    info!("Fetching tags for {} tracks; this can take a while", pairs.len());
    cache.batch_resolve(&pairs, tag_source, Some(&store), config.mood_concurrency)
}

/// Rebuild the taste profile from the full history and persist it.
pub fn rebuild_profile(config: &Config) -> Result<TasteProfile> {
    let cache = TagMoodCache::load(&config.tag_mood_cache);
    let profile = TasteProfile::build_from_dir(&config.history_dir, &cache)?;
    profile.save(&config.profile_path)?;
    Ok(profile)
}

/// Delete the persisted tag/mood cache and raw-tag store so the next run
/// rebuilds them from scratch.
pub fn clear_caches(config: &Config) -> Result<()> {
    for path in [&config.tag_mood_cache, &config.cache_db] {
        if path.exists() {
            std::fs::remove_file(path)?;
            info!("Removed {}", path.display());
        }
    }
    Ok(())
}

/// Seed-song playlist: similar tracks intersected with the library, scored
/// against the persisted profile and emitted through the sink.
pub fn run_seed(
    config: &Config,
    library: &dyn LibrarySource,
    similar: &dyn SimilarSource,
    sink: &dyn PlaylistSink,
    seed: &str,
    limit: usize,
) -> Result<Option<Playlist>> {
    let tracks = library.load()?;
    let cache = TagMoodCache::load(&config.tag_mood_cache);
    let profile = match TasteProfile::load(&config.profile_path) {
        Ok(profile) => profile,
        Err(err) => {
            warn!("No usable taste profile ({err}); seeding without history weights");
            TasteProfile::default()
        }
    };

    let playlist =
        seed_playlist(seed, &tracks, &profile, &cache, &ScoreWeights::default(), similar, limit);
    if let Some(playlist) = &playlist {
        sink.emit(playlist)?;
    }
    Ok(playlist)
}

/// Every (artist, title) pair the run knows about, library first.
fn cache_pairs(tracks: &[TrackRecord], events: &[crate::profile::PlayEvent]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> =
        tracks.iter().map(|t| (t.artist.clone(), t.name.clone())).collect();
    for event in events {
        if let (Some(artist), Some(track)) = (&event.artist, &event.track) {
            if !artist.is_empty() && !track.is_empty() {
                pairs.push((artist.clone(), track.clone()));
            }
        }
    }
    pairs
}

fn apply_filters(tracks: Vec<TrackRecord>, filters: &RunFilters) -> Vec<TrackRecord> {
    let before = tracks.len();
    let tracks: Vec<TrackRecord> = tracks
        .into_iter()
        .filter(|t| {
            filters.genre.as_deref().map_or(true, |g| t.genre.eq_ignore_ascii_case(g))
                && filters.mood.as_deref().map_or(true, |m| t.mood_label().eq_ignore_ascii_case(m))
        })
        .collect();
    if tracks.len() < before {
        info!("Filters kept {} of {before} tracks", tracks.len());
    }
    tracks
}
