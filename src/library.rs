//! # Library Sources
//!
//! Supplies the initial [`TrackRecord`] set. Two concrete sources are
//! provided: the slim JSON library format (a converted library export) and
//! a recursive directory scan that derives `Artist - Title` from filenames.
//! Both normalize on the way in: rows missing a name or artist are dropped
//! and genres are title-cased, so the rest of the pipeline can assume clean
//! fields.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;
use walkdir::WalkDir;

use crate::error::{MixgenError, Result};
use crate::track::TrackRecord;

/// Anything that can produce the initial track set for a run.
pub trait LibrarySource {
    fn load(&self) -> Result<Vec<TrackRecord>>;
}

/// Audio file extensions recognized by the directory scanner.
const AUDIO_EXTENSIONS: [&str; 7] = ["mp3", "m4a", "flac", "ogg", "wav", "aac", "wma"];

/// Raw row of the slim JSON library format. Alternate name keys produced by
/// different exporters are tolerated via aliases.
#[derive(Debug, Deserialize)]
struct RawTrack {
    #[serde(rename = "Name", alias = "Title", alias = "Track Name")]
    name: Option<String>,
    #[serde(rename = "Artist")]
    artist: Option<String>,
    #[serde(rename = "Genre", default)]
    genre: Option<String>,
    #[serde(rename = "Location", default)]
    location: Option<String>,
    #[serde(rename = "Play Count", default)]
    play_count: Option<u32>,
    #[serde(rename = "Skip Count", default)]
    skip_count: Option<u32>,
    #[serde(rename = "Year", default)]
    year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct RawLibrary {
    #[serde(default)]
    tracks: Vec<RawTrack>,
}

/// Slim-JSON library file (`{"tracks": [...]}`).
pub struct JsonLibrary {
    path: std::path::PathBuf,
}

impl JsonLibrary {
    pub fn new<P: Into<std::path::PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl LibrarySource for JsonLibrary {
    fn load(&self) -> Result<Vec<TrackRecord>> {
        load_library_json(&self.path)
    }
}

/// Directory of audio files, identities taken from filenames.
pub struct DirLibrary {
    root: std::path::PathBuf,
}

impl DirLibrary {
    pub fn new<P: Into<std::path::PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl LibrarySource for DirLibrary {
    fn load(&self) -> Result<Vec<TrackRecord>> {
        scan_library_dir(&self.root)
    }
}

/// Load the slim JSON library format, dropping rows without an identity.
pub fn load_library_json(path: &Path) -> Result<Vec<TrackRecord>> {
    let data = fs::read_to_string(path)?;
    let raw: RawLibrary = serde_json::from_str(&data)?;

    let total = raw.tracks.len();
    let tracks: Vec<TrackRecord> = raw
        .tracks
        .into_iter()
        .filter_map(|row| {
            let name = row.name.filter(|s| !s.trim().is_empty())?;
            let artist = row.artist.filter(|s| !s.trim().is_empty())?;
            Some(TrackRecord {
                name,
                artist,
                genre: title_case(row.genre.as_deref().unwrap_or("").trim()),
                location: row.location.unwrap_or_default(),
                play_count: row.play_count.unwrap_or(0),
                skip_count: row.skip_count.unwrap_or(0),
                year: row.year,
                mood: None,
                score: 0.0,
            })
        })
        .collect();

    if tracks.len() < total {
        warn!("Dropped {} library rows missing name or artist", total - tracks.len());
    }
    info!("Loaded {} tracks from {}", tracks.len(), path.display());

    if tracks.is_empty() {
        return Err(MixgenError::EmptyLibrary);
    }
    Ok(tracks)
}

/// Recursively scan a directory for audio files.
///
/// Filenames of the form `Artist - Title.ext` split into identity fields;
/// anything else keeps its stem as the title with an `"Unknown"` artist.
pub fn scan_library_dir(root: &Path) -> Result<Vec<TrackRecord>> {
    if !root.exists() {
        return Err(MixgenError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("library directory not found: {}", root.display()),
        )));
    }

    let mut tracks = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_audio = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()));
        if !is_audio {
            continue;
        }

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let (artist, name) = match stem.split_once(" - ") {
            Some((a, t)) if !a.trim().is_empty() => (a.trim().to_string(), t.trim().to_string()),
            _ => ("Unknown".to_string(), stem.trim().to_string()),
        };
        if name.is_empty() {
            continue;
        }

        tracks.push(TrackRecord {
            name,
            artist,
            location: path.to_string_lossy().into_owned(),
            ..Default::default()
        });
    }

    info!("Scanned {} audio files under {}", tracks.len(), root.display());
    if tracks.is_empty() {
        return Err(MixgenError::EmptyLibrary);
    }
    Ok(tracks)
}

/// Title-case a free-text genre ("alt rock" -> "Alt Rock").
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
