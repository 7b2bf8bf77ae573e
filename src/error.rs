//! Error types for the playlist pipeline.
//!
//! Transient externalities (an unreachable tag source, a malformed history
//! row, an unreadable cache file) are handled where they occur and never
//! show up here. This enum only carries the terminal conditions a run
//! cannot recover from, plus transparent conversions for the usual IO and
//! storage failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MixgenError {
    /// The library source yielded no usable tracks.
    #[error("library contains no tracks")]
    EmptyLibrary,

    /// No play-history files were found where the configuration points.
    #[error("no history files found in {0}")]
    NoHistory(PathBuf),

    /// Every segmentation strategy came up empty.
    #[error("segmentation produced no clusters")]
    EmptySegmentation,

    /// The configuration file exists but cannot be used.
    #[error("invalid configuration ({path}): {message}")]
    InvalidConfig { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, MixgenError>;
