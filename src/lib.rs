//! Taste-aware playlist generation from a listening library and play
//! history.
//!
//! Core modules, in pipeline order:
//! - [`tag_cache`] - Persisted tag/mood cache over an external tag source
//! - [`profile`] - Taste profile aggregated from play history
//! - [`score`] - Per-track desirability scoring
//! - [`segment`] - Clustering the scored library into candidate playlists
//! - [`assemble`] - Bounded, diversified playlist assembly
//!
//! ### Supporting Modules
//!
//! - [`mood`] - The closed canonical mood set and tag canonicalization
//! - [`track`] - Track records and identity normalization
//! - [`library`] - Library sources (JSON export, directory scan)
//! - [`seed`] - Seed-song playlists from a similarity source
//! - [`lastfm`] - Last.fm tag/similarity collaborator
//! - [`pipeline`] - Stage orchestration
//! - [`config`] - Configuration and data directory management
//! - [`cli`] - Command-line interface definitions
//! - [`error`] - Error taxonomy
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use mixgen::config::Config;
//! use mixgen::library::JsonLibrary;
//! use mixgen::assemble::LogSink;
//! use mixgen::lastfm::LastfmClient;
//! use mixgen::pipeline::{self, RunFilters};
//!
//! let config = Config::load(None)?;
//! let library = JsonLibrary::new(config.library_json.clone());
//! let tags = LastfmClient::new("api-key".to_string());
//!
//! let playlists = pipeline::run(&config, &library, &tags, &LogSink, &RunFilters::default())?;
//! for playlist in playlists {
//!     println!("{} ({} tracks)", playlist.label, playlist.len());
//! }
//! # Ok::<(), mixgen::error::MixgenError>(())
//! ```

pub mod assemble;
pub mod cli;
pub mod config;
pub mod error;
pub mod lastfm;
pub mod library;
pub mod mood;
pub mod pipeline;
pub mod profile;
pub mod score;
pub mod seed;
pub mod segment;
pub mod tag_cache;
pub mod track;

pub use assemble::{Playlist, PlaylistSink};
pub use error::{MixgenError, Result};
pub use mood::Mood;
pub use profile::TasteProfile;
pub use segment::Cluster;
pub use track::TrackRecord;
