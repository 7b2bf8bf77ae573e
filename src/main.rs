//! # Mixgen CLI
//!
//! Thin binary over the mixgen library: parse arguments, load
//! configuration, wire up the collaborators (library source, tag source,
//! playlist sink) and route to the pipeline operations.
//!
//! Logging is controlled via `RUST_LOG`:
//!
//! ```bash
//! RUST_LOG=debug mixgen run
//! RUST_LOG=mixgen::segment=trace mixgen run
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{info, warn};

use mixgen::assemble::{LogSink, M3uSink, PlaylistSink};
use mixgen::cli::{self, Args, Command};
use mixgen::config::Config;
use mixgen::lastfm::LastfmClient;
use mixgen::library::{DirLibrary, JsonLibrary, LibrarySource};
use mixgen::pipeline;
use mixgen::tag_cache::TagSource;

/// Tag source of last resort when no API key is configured: resolves
/// nothing, so runs still work off whatever the cache already holds.
struct NullTagSource;

impl TagSource for NullTagSource {
    fn fetch_tags(&self, _artist: &str, _title: &str) -> Vec<String> {
        Vec::new()
    }
}

fn library_source(config: &Config, library_dir: Option<PathBuf>) -> Box<dyn LibrarySource> {
    match library_dir {
        Some(dir) => Box::new(DirLibrary::new(dir)),
        None => Box::new(JsonLibrary::new(config.library_json.clone())),
    }
}

fn tag_source(config: &Config) -> Box<dyn TagSource> {
    match &config.lastfm_api_key {
        Some(key) => Box::new(LastfmClient::new(key.clone())),
        None => {
            warn!("No Last.fm API key configured; tag fetching is disabled for this run");
            Box::new(NullTagSource)
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(key) = args.api_key {
        config.lastfm_api_key = Some(key);
    }

    match args.command {
        Command::Run { genre, mood, library_dir, dry_run } => {
            let library = library_source(&config, library_dir);
            let tags = tag_source(&config);
            let sink: Box<dyn PlaylistSink> = if dry_run {
                Box::new(LogSink)
            } else {
                Box::new(M3uSink::new(config.output_dir.clone()))
            };
            let filters = pipeline::RunFilters { genre, mood };

            let playlists = pipeline::run(&config, &*library, &*tags, &*sink, &filters)
                .context("Pipeline run failed")?;
            println!("Generated {} playlists:", playlists.len());
            for playlist in &playlists {
                println!("  {} ({} tracks)", playlist.label, playlist.len());
            }
        }
        Command::BuildCache { library_dir } => {
            let library = library_source(&config, library_dir);
            let tags = tag_source(&config);
            let (processed, skipped) = pipeline::build_cache(&config, &*library, &*tags)
                .context("Cache build failed")?;
            println!("Mood-tagged {processed} tracks; {skipped} already cached");
        }
        Command::RecacheMoods { library_dir } => {
            pipeline::clear_caches(&config).context("Failed to clear caches")?;
            let library = library_source(&config, library_dir);
            let tags = tag_source(&config);
            let (processed, skipped) = pipeline::build_cache(&config, &*library, &*tags)
                .context("Cache rebuild failed")?;
            println!("Re-tagged {processed} tracks; {skipped} skipped");
        }
        Command::Profile => {
            let profile =
                pipeline::rebuild_profile(&config).context("Profile rebuild failed")?;
            println!(
                "Profile rebuilt: {} artists, {} moods, {} tracks",
                profile.artist_scores.len(),
                profile.mood_scores.len(),
                profile.track_play_counts.len(),
            );
        }
        Command::Seed { song, num, library_dir } => {
            let Some(key) = config.lastfm_api_key.clone() else {
                anyhow::bail!("Seed playlists need a Last.fm API key (--api-key or LASTFM_API_KEY)");
            };
            let library = library_source(&config, library_dir);
            let client = LastfmClient::new(key);
            let sink = M3uSink::new(config.output_dir.clone());

            info!("Building seed playlist from '{song}'");
            match pipeline::run_seed(&config, &*library, &client, &sink, &song, num)
                .context("Seed playlist failed")?
            {
                Some(playlist) => println!("{} ({} tracks)", playlist.label, playlist.len()),
                None => println!("No similar tracks found in the library for '{song}'"),
            }
        }
        Command::Completion { shell } => {
            let mut cmd = Args::command();
            let shell = match shell {
                cli::Shell::Bash => clap_complete::Shell::Bash,
                cli::Shell::Zsh => clap_complete::Shell::Zsh,
                cli::Shell::Fish => clap_complete::Shell::Fish,
                cli::Shell::PowerShell => clap_complete::Shell::PowerShell,
                cli::Shell::Elvish => clap_complete::Shell::Elvish,
            };
            clap_complete::generate(shell, &mut cmd, "mixgen", &mut std::io::stdout());
        }
    }

    Ok(())
}
