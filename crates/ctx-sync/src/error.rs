//! Error types for ctx-sync

use std::path::PathBuf;

/// Result type for ctx-sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ctx-sync operations
///
/// Conflicts are not errors: they are returned as
/// [`SyncAction::Conflict`](crate::SyncAction::Conflict) data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A path could not be read; isolated to that path
    #[error("Failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// A propagate or pullback could not be materialized
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: ctx_fs::Error,
    },

    /// Invalid watcher configuration
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    #[error("Unknown tool: {slug}")]
    UnknownTool { slug: String },

    #[error("Path is not watched: {path}")]
    NotWatched { path: String },

    /// A relative path matches tracked paths under more than one root
    #[error("Path is watched under several roots: {path}")]
    AmbiguousPath { path: String },

    // Transparent wrappers for underlying crate errors
    /// Tool registry error from ctx-tools
    #[error(transparent)]
    Tools(#[from] ctx_tools::Error),

    /// Filesystem error from ctx-fs
    #[error(transparent)]
    Fs(#[from] ctx_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn read(path: impl Into<PathBuf>, source: impl std::fmt::Display) -> Self {
        Self::Read {
            path: path.into(),
            message: source.to_string(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: ctx_fs::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether the next poll should re-decide the event that failed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::Write { .. } | Self::Io(_))
    }
}
