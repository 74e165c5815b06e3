//! Error types for chessdex

use thiserror::Error;

/// Result type alias for chessdex operations
pub type Result<T> = std::result::Result<T, ChessdexError>;

/// Main error type shared across the workspace
#[derive(Error, Debug)]
pub enum ChessdexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl ChessdexError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
