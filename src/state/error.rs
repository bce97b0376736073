use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Cannot open state store at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("Cannot create state directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("State schema setup failed: {0}")]
    Schema(#[from] rusqlite::Error),

    #[error("State schema version {found} is newer than this build understands ({expected})")]
    UnsupportedSchemaVersion { found: i32, expected: i32 },

    #[error("Reading {key} failed: {source}")]
    Read {
        key: String,
        source: rusqlite::Error,
    },

    #[error("Writing {key} failed: {source}")]
    Write {
        key: String,
        source: rusqlite::Error,
    },

    /// A previous holder of the store lock panicked.
    #[error("State store lock poisoned")]
    Poisoned,

    #[error("State store task failed: {0}")]
    Spawn(#[from] tokio::task::JoinError),
}

impl StateError {
    pub(crate) fn read(key: &str) -> impl FnOnce(rusqlite::Error) -> Self + '_ {
        move |source| Self::Read {
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn write(key: &str) -> impl FnOnce(rusqlite::Error) -> Self + '_ {
        move |source| Self::Write {
            key: key.to_string(),
            source,
        }
    }
}
