//! Error types for ctx-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from the sync engine
    #[error(transparent)]
    Sync(#[from] ctx_sync::Error),

    /// Error from the tool registry
    #[error(transparent)]
    Tools(#[from] ctx_tools::Error),

    /// Error from ctx-fs
    #[error(transparent)]
    Fs(#[from] ctx_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }
}
