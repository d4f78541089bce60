//! Error types for the McLighting protocol

use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol error types
#[derive(Error, Debug)]
pub enum Error {
    /// Inbound frame is not valid JSON
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// Color text could not be decoded
    #[error("invalid color: {0}")]
    InvalidColor(String),

    /// Hex pixel payload could not be decoded
    #[error("invalid hex payload: {0}")]
    InvalidHex(String),
}
