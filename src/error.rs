//! Error types for the auth gateway

use std::io;

use thiserror::Error;

/// Result type alias for the auth gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Auth gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid introspection endpoint URL
    #[error("Invalid introspection endpoint: {0}")]
    InvalidEndpoint(String),

    /// Server bind/startup error
    #[error("Server error: {0}")]
    Server(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
