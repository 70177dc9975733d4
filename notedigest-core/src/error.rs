//! Error types for notedigest-core

use thiserror::Error;

/// Main error type for the notedigest-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Misskey API error
    #[error("API error: {0}")]
    Api(String),

    /// AI completion endpoint error
    #[error("AI error: {0}")]
    Ai(String),

    /// Pipeline precondition failure (missing artifact, empty content,
    /// over-length post)
    #[error("pipeline error: {0}")]
    Pipeline(String),
}

/// Result type alias for notedigest-core
pub type Result<T> = std::result::Result<T, Error>;
