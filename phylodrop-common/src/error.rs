//! Common error types for phylodrop

use thiserror::Error;

/// Common result type for phylodrop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the ingestion pipeline and its consumers
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error (wraps serde_json::Error)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
