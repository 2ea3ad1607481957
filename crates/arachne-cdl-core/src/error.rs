//! Error types for arachne-cdl-core.
//!
//! `Error` covers configuration and state file handling. The download
//! pipeline has its own taxonomy (`FetchError`, `ReconcileError`,
//! `PersistError`) which is collected into `DownloadError` so the controller
//! can report any failure through a single notification.

use std::path::PathBuf;
use thiserror::Error;

use crate::fetch::FetchError;
use crate::reconcile::ReconcileError;

/// Errors raised while loading configuration or persisted state.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration:\n  {}", .0.join("\n  "))]
    ConfigValidation(Vec<String>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure to write downloaded material to disk.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot save {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot restrict permissions of {}: {source}", path.display())]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Any failure of a single fetch-and-apply cycle.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("unknown download type '{0}'")]
    UnknownType(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}
