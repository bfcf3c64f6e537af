//! Mapping of HTTP failures onto docchat errors.

use docchat_core::Error;

/// Coarse classification of a non-success HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    /// Request rejected as invalid (missing name, no active store).
    BadRequest,
    /// Missing or invalid credential.
    Unauthorized,
    /// Store or route not found.
    NotFound,
    /// Rate limit exceeded.
    RateLimited,
    /// Server error.
    ServerError,
    /// Unknown error.
    Unknown,
}

impl ApiErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::BadRequest,
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

/// Convert a failed response into a docchat Error.
///
/// `message` is the server's own error text when the body carried one; it is
/// passed through verbatim so callers can show it to the user.
pub fn to_docchat_error(status: u16, message: Option<String>) -> Error {
    let code = ApiErrorCode::from_status(status);
    match (code, message) {
        (ApiErrorCode::NotFound, Some(msg)) => Error::NotFound(msg),
        (ApiErrorCode::NotFound, None) => Error::NotFound(format!("HTTP {}", status)),
        (_, Some(msg)) => Error::Api(msg),
        (ApiErrorCode::RateLimited, None) => Error::Api("Rate limit exceeded".to_string()),
        (ApiErrorCode::Unauthorized, None) => Error::Api("API key missing or invalid".to_string()),
        (_, None) => Error::Api(format!("Server returned HTTP {}", status)),
    }
}
