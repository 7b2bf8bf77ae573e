//! # Command-Line Interface Module
//!
//! Clap derive definitions for the mixgen CLI. Each subcommand maps to one
//! pipeline operation; the heavy lifting lives in the library crate.
//!
//! ## Examples
//!
//! ```bash
//! mixgen run
//! mixgen run --mood Chill --library-dir ~/Music
//! mixgen build-cache
//! mixgen seed --song "Miles Davis - So What" --num 20
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Main application arguments.
#[derive(Parser)]
#[command(name = "mixgen")]
#[command(about = "Mixgen: taste-aware playlists from your library and listening history")]
#[command(version)]
pub struct Args {
    /// Path to a configuration file (defaults to ./mixgen.toml, then the
    /// platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Last.fm API key for tag and similarity lookups
    #[arg(long, env = "LASTFM_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the full pipeline: cache, profile, score, segment, assemble
    ///
    /// Produces one playlist per cluster (up to the configured count) in
    /// the output directory. The tag/mood cache and taste profile are
    /// refreshed as part of the run.
    Run {
        /// Keep only tracks matching this genre
        #[arg(long)]
        genre: Option<String>,

        /// Keep only tracks matching this mood
        #[arg(long)]
        mood: Option<String>,

        /// Scan this directory instead of loading the JSON library export
        #[arg(long)]
        library_dir: Option<PathBuf>,

        /// Log the resulting playlists instead of writing files
        #[arg(long)]
        dry_run: bool,
    },

    /// Fetch tags and moods for every known track into the cache
    ///
    /// Resolved entries are skipped, so re-running is cheap. Progress is
    /// checkpointed; an interrupted run resumes where it left off.
    BuildCache {
        /// Scan this directory instead of loading the JSON library export
        #[arg(long)]
        library_dir: Option<PathBuf>,
    },

    /// Delete the tag/mood cache and re-fetch everything
    RecacheMoods {
        /// Scan this directory instead of loading the JSON library export
        #[arg(long)]
        library_dir: Option<PathBuf>,
    },

    /// Rebuild the taste profile from the play history
    Profile,

    /// Generate a playlist from a seed song
    Seed {
        /// Seed song as "Artist - Title"
        #[arg(long)]
        song: String,

        /// Number of tracks in the mix
        #[arg(long, default_value = "20")]
        num: usize,

        /// Scan this directory instead of loading the JSON library export
        #[arg(long)]
        library_dir: Option<PathBuf>,
    },

    /// Generate shell completions
    ///
    /// Usage: mixgen completion bash > ~/.local/share/bash-completion/completions/mixgen
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
