//! Error types for joke-meter

use thiserror::Error;

/// Result type alias for joke-meter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while scoring a broadcast
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Chat channel error (connection, protocol)
    #[error("channel error: {0}")]
    Channel(String),

    /// Upstream API returned an error status or an unexpected payload
    #[error("upstream error: {0}")]
    Upstream(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),
}
