//! # Tag and Mood Cache
//!
//! The only component that talks to an external tag source, and the only
//! persisted cache. Two layers are kept on disk:
//!
//! - a JSON map from track id to `{tags, mood}`, the read-through cache the
//!   scoring and profile stages consume, and
//! - a SQLite key-value table of raw tag responses, so that repeated misses
//!   (including tracks the source knows nothing about) never hit the
//!   network twice.
//!
//! An entry whose mood is resolved is final: it is returned immediately and
//! never re-fetched unless the cache files are explicitly cleared. Batch
//! runs fetch in parallel on a bounded pool but merge and persist on a
//! single thread, checkpointing every [`CHECKPOINT_INTERVAL`] entries so a
//! crash loses at most one chunk of work.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mood::{canonical_mood, Mood, TagCorpus};
use crate::track::track_id;

/// Entries written back to disk between checkpoints during a batch run.
pub const CHECKPOINT_INTERVAL: usize = 100;

/// External supplier of raw tags for an (artist, title) pair.
///
/// Implementations must fail soft: network and parse errors become an empty
/// list, never an error the pipeline has to handle.
pub trait TagSource: Sync {
    fn fetch_tags(&self, artist: &str, title: &str) -> Vec<String>;
}

/// Cached tags and derived mood for one track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagMoodEntry {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub mood: Option<Mood>,
}

/// Low-level key-value store for raw tag responses.
pub struct TagStore {
    conn: Connection,
}

impl TagStore {
    /// Open (creating if needed) the raw-tag store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS raw_tags (
                key  TEXT PRIMARY KEY,
                tags TEXT NOT NULL
            )",
            (),
        )?;
        Ok(Self { conn })
    }

    /// In-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS raw_tags (
                key  TEXT PRIMARY KEY,
                tags TEXT NOT NULL
            )",
            (),
        )?;
        Ok(Self { conn })
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<String>>> {
        let mut stmt = self.conn.prepare("SELECT tags FROM raw_tags WHERE key = ?1")?;
        let payload: Option<String> =
            stmt.query_row([key], |row| row.get(0)).map(Some).or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, key: &str, tags: &[String]) -> Result<()> {
        let payload = serde_json::to_string(tags)?;
        self.conn
            .execute("INSERT OR REPLACE INTO raw_tags (key, tags) VALUES (?1, ?2)", (key, &payload))?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM raw_tags", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// The persisted tag/mood cache.
pub struct TagMoodCache {
    path: PathBuf,
    entries: HashMap<String, TagMoodEntry>,
    corpus: TagCorpus,
    dirty: bool,
}

impl TagMoodCache {
    /// Load the cache from `path`. A missing file starts empty; an
    /// unreadable one is treated as empty (the run proceeds and entries are
    /// rebuilt lazily).
    pub fn load(path: &Path) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str::<HashMap<String, TagMoodEntry>>(&data) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!("Tag cache {} is unreadable ({err}); starting empty", path.display());
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        debug!("Loaded tag cache with {} entries from {}", entries.len(), path.display());
        Self { path: path.to_path_buf(), entries, corpus: TagCorpus::new(), dirty: false }
    }

    /// Cache for tests: no backing file until `save` is called.
    #[must_use]
    pub fn empty(path: &Path) -> Self {
        Self { path: path.to_path_buf(), entries: HashMap::new(), corpus: TagCorpus::new(), dirty: false }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TagMoodEntry> {
        self.entries.get(id)
    }

    /// Read-only mood lookup, used at scoring and profile-building time
    /// (no fetch is ever triggered from those stages).
    #[must_use]
    pub fn mood_of(&self, id: &str) -> Option<Mood> {
        self.entries.get(id).and_then(|e| e.mood)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve tags and mood for one track, fetching on a miss.
    ///
    /// A hit with a resolved mood returns immediately. Otherwise raw tags
    /// come from (in order) the raw-tag store, the entry's own previously
    /// fetched tags, or the external source; the result is written back so
    /// the miss is not repeated, even when the source returned nothing.
    pub fn resolve(
        &mut self,
        artist: &str,
        title: &str,
        source: &dyn TagSource,
        store: Option<&TagStore>,
    ) -> TagMoodEntry {
        let id = track_id(artist, title);
        if let Some(entry) = self.entries.get(&id) {
            if entry.mood.is_some() {
                return entry.clone();
            }
        }

        let tags = self.raw_tags_for(&id, artist, title, source, store);
        self.corpus.observe_all(&tags);
        let mood = canonical_mood(&tags, &self.corpus);
        let entry = TagMoodEntry { tags, mood };
        self.entries.insert(id, entry.clone());
        self.dirty = true;
        entry
    }

    /// Resolve a whole batch of (artist, title) pairs.
    ///
    /// Pairs whose mood is already resolved are skipped. The rest are
    /// processed in checkpoint-sized chunks: raw tags are gathered (store
    /// hits sequentially, misses fetched on a pool of `concurrency`
    /// workers), then a single thread merges results, updates the corpus
    /// counter, derives moods and writes the checkpoint. Returns
    /// `(processed, skipped)`.
    pub fn batch_resolve(
        &mut self,
        pairs: &[(String, String)],
        source: &dyn TagSource,
        store: Option<&TagStore>,
        concurrency: usize,
    ) -> Result<(usize, usize)> {
        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        let mut skipped = 0usize;
        for (artist, title) in pairs {
            let id = track_id(artist, title);
            if !seen.insert(id.clone()) {
                continue;
            }
            if self.mood_of(&id).is_some() {
                debug!("Skipping {artist} - {title}: mood already cached");
                skipped += 1;
                continue;
            }
            pending.push((id, artist.as_str(), title.as_str()));
        }

        if pending.is_empty() {
            info!("Tag cache up to date: {} entries, {skipped} skipped", self.entries.len());
            return Ok((0, skipped));
        }
        info!("Resolving tags for {} tracks ({skipped} already cached)", pending.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency.max(1))
            .build()
            .map_err(|err| std::io::Error::other(err.to_string()))?;

        let mut processed = 0usize;
        for chunk in pending.chunks(CHECKPOINT_INTERVAL) {
            // Store hits first; only true misses go out to the source.
            let mut chunk_tags: Vec<Option<Vec<String>>> = Vec::with_capacity(chunk.len());
            let mut to_fetch: Vec<usize> = Vec::new();
            for (i, (id, _, _)) in chunk.iter().enumerate() {
                let cached = match store {
                    Some(store) => store.get(id)?,
                    None => None,
                };
                if cached.is_none() {
                    to_fetch.push(i);
                }
                chunk_tags.push(cached);
            }

            // Workers touch disjoint keys; completion order is irrelevant.
            let fetched: Vec<(usize, Vec<String>)> = pool.install(|| {
                to_fetch
                    .par_iter()
                    .map(|&i| {
                        let (_, artist, title) = &chunk[i];
                        (i, source.fetch_tags(artist, title))
                    })
                    .collect()
            });
            for (i, tags) in fetched {
                if let Some(store) = store {
                    if let Err(err) = store.put(&chunk[i].0, &tags) {
                        warn!("Failed to store raw tags for {}: {err}", chunk[i].0);
                    }
                }
                chunk_tags[i] = Some(tags);
            }

            // Single-writer merge in input order.
            for ((id, _, _), tags) in chunk.iter().zip(chunk_tags) {
                let tags = tags.unwrap_or_default();
                self.corpus.observe_all(&tags);
                let mood = canonical_mood(&tags, &self.corpus);
                self.entries.insert(id.clone(), TagMoodEntry { tags, mood });
                processed += 1;
            }
            self.dirty = true;
            self.save()?;
            debug!("Checkpointed tag cache at {} entries", self.entries.len());
        }

        info!("Mood-tagged {processed} tracks; skipped {skipped}");
        Ok((processed, skipped))
    }

    /// Write the cache back to its file.
    pub fn save(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json)?;
        self.dirty = false;
        Ok(())
    }

    pub fn save_if_dirty(&mut self) -> Result<()> {
        if self.dirty {
            self.save()?;
        }
        Ok(())
    }

    /// Raw tags for one track: store hit, previously fetched entry tags,
    /// or a fresh (fail-soft) fetch, written through to the store.
    fn raw_tags_for(
        &self,
        id: &str,
        artist: &str,
        title: &str,
        source: &dyn TagSource,
        store: Option<&TagStore>,
    ) -> Vec<String> {
        if let Some(store) = store {
            match store.get(id) {
                Ok(Some(tags)) => return tags,
                Ok(None) => {}
                Err(err) => warn!("Raw tag store lookup failed for {id}: {err}"),
            }
        }
        if let Some(entry) = self.entries.get(id) {
            if !entry.tags.is_empty() {
                return entry.tags.clone();
            }
        }
        let tags = source.fetch_tags(artist, title);
        if let Some(store) = store {
            if let Err(err) = store.put(id, &tags) {
                warn!("Failed to store raw tags for {id}: {err}");
            }
        }
        tags
    }
}
