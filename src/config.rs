//! # Configuration Module
//!
//! Run configuration with full defaults, optionally overridden by a TOML
//! file. The persistent caches live in the platform-standard data
//! directory:
//!
//! - Linux: `~/.local/share/mixgen/`
//! - macOS: `~/Library/Application Support/mixgen/`
//! - Windows: `%APPDATA%\mixgen\`
//!
//! A config file is looked up at `./mixgen.toml` first, then at the
//! platform config directory (`~/.config/mixgen/config.toml` on Linux).
//! Every key is optional; unset keys keep their defaults. The Last.fm API
//! key can also come from the `LASTFM_API_KEY` environment variable, which
//! wins over the file.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{MixgenError, Result};
use crate::segment::SegmentOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Slim JSON library export.
    pub library_json: PathBuf,
    /// Directory of streaming-history `*.json` files.
    pub history_dir: PathBuf,
    /// Persisted taste profile.
    pub profile_path: PathBuf,
    /// Where finished playlists are written.
    pub output_dir: PathBuf,
    /// JSON tag/mood cache.
    pub tag_mood_cache: PathBuf,
    /// SQLite store for raw tag responses.
    pub cache_db: PathBuf,
    pub lastfm_api_key: Option<String>,

    pub cluster_count: usize,
    /// How many playlists to emit per run; defaults to one per cluster.
    pub num_playlists: Option<usize>,
    pub max_per_artist: usize,
    pub tracks_per_mix: usize,

    pub mood_mix_enabled: bool,
    pub year_mix_enabled: bool,
    pub year_mix_range: i32,
    pub min_tracks_per_year: usize,
    /// Density clustering instead of k-means in the feature stage.
    pub density_clustering: bool,

    /// Worker count for batch tag fetching.
    pub mood_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data = data_dir();
        Self {
            library_json: PathBuf::from("./library.json"),
            history_dir: PathBuf::from("./history"),
            profile_path: data.join("taste_profile.json"),
            output_dir: PathBuf::from("./mixes"),
            tag_mood_cache: data.join("tag_mood_cache.json"),
            cache_db: data.join("raw_tags.db3"),
            lastfm_api_key: None,
            cluster_count: 6,
            num_playlists: None,
            max_per_artist: 4,
            tracks_per_mix: 50,
            mood_mix_enabled: false,
            year_mix_enabled: true,
            year_mix_range: 1,
            min_tracks_per_year: 10,
            density_clustering: false,
            mood_concurrency: 10,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicitly given path must exist and parse; the default locations
    /// are optional and fall back to defaults when absent. An unreadable
    /// file is a configuration error, not something to silently paper over.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_paths().into_iter().find(|p| p.exists()),
        };

        let mut config = match path {
            Some(path) => {
                let data = fs::read_to_string(&path).map_err(|err| MixgenError::InvalidConfig {
                    path: path.clone(),
                    message: err.to_string(),
                })?;
                let config: Config =
                    toml::from_str(&data).map_err(|err| MixgenError::InvalidConfig {
                        path: path.clone(),
                        message: err.to_string(),
                    })?;
                debug!("Loaded configuration from {}", path.display());
                config
            }
            None => Config::default(),
        };

        // The environment wins over the file for the API key.
        if let Ok(key) = std::env::var("LASTFM_API_KEY") {
            if !key.is_empty() {
                config.lastfm_api_key = Some(key);
            }
        }
        Ok(config)
    }

    /// Segmentation options derived from this configuration.
    #[must_use]
    pub fn segment_options(&self) -> SegmentOptions {
        SegmentOptions {
            by_mood: self.mood_mix_enabled,
            by_year: self.year_mix_enabled,
            year_range: self.year_mix_range,
            min_tracks_per_year: self.min_tracks_per_year,
            cluster_count: self.cluster_count,
            density: self.density_clustering,
        }
    }
}

/// Platform data directory for mixgen, created on first use. Falls back to
/// the working directory when the platform reports none.
#[must_use]
pub fn data_dir() -> PathBuf {
    let dir = dirs::data_dir().map_or_else(|| PathBuf::from("."), |d| d.join("mixgen"));
    let _ = fs::create_dir_all(&dir);
    dir
}

fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("mixgen.toml")];
    if let Some(config) = dirs::config_dir() {
        paths.push(config.join("mixgen").join("config.toml"));
    }
    paths
}
