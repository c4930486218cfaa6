//! Error types for ctx-tools

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Filesystem error: {0}")]
    Fs(#[from] ctx_fs::Error),

    /// Malformed registry entry; fatal at startup
    #[error("Invalid tool registry: {message}")]
    Configuration { message: String },

    #[error("Unknown tool: {slug}")]
    UnknownTool { slug: String },
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
