//! Client error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The link is already closed; callers reconnect instead of retrying
    #[error("connection closed")]
    ConnectionClosed,

    #[error("timeout")]
    Timeout,

    #[error("state bus error: {0}")]
    Bus(String),

    #[error("client error: {0}")]
    Other(String),
}
