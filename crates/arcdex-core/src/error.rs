use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot open archive {path}: {reason}")]
    ArchiveOpen { path: PathBuf, reason: String },

    #[error("Cannot initialise index at {path}: {reason}")]
    IndexInit { path: PathBuf, reason: String },

    #[error("Indexing failed: {reason}")]
    Indexing { reason: String },

    #[error("Cannot publish index to {path}: {reason}")]
    Publish { path: PathBuf, reason: String },

    #[error("Cannot prepare scratch index at {path}: {reason}")]
    Scratch { path: PathBuf, reason: String },

    #[error("Scratch index already exists at {0}")]
    Conflict(PathBuf),

    #[error("An archive is already being indexed")]
    AlreadyIndexing,

    #[error("No indexing run is in progress")]
    NotRunning,

    #[error("No active archive is configured")]
    NoActiveArchive,

    #[error("Search string is empty")]
    EmptyQuery,

    #[error("No search index found at {0}")]
    IndexNotFound(PathBuf),

    #[error("Background runtime unavailable: {0}")]
    Runtime(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn indexing(reason: impl std::fmt::Display) -> Self {
        Self::Indexing { reason: reason.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
