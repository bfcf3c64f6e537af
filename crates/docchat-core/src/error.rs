//! Error types for docchat.

use thiserror::Error;

/// Result type alias using docchat's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for docchat operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The server answered with an expected failure (`status: error` / `error` field)
    #[error("{0}")]
    Api(String),

    /// HTTP/network request failed before a usable response arrived
    #[error("Request error: {0}")]
    Request(String),

    /// Response body did not match the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// No store is active and one could not be created
    #[error("{0}")]
    NoActiveStore(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for transport-level failures (as opposed to server-reported ones).
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Request(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::MalformedResponse(e.to_string())
        } else {
            Error::Request(e.to_string())
        }
    }
}
