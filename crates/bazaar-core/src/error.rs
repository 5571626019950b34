//! Error types for bazaar-core.

use crate::types::ErrorBody;
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type alias using bazaar-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for bazaar operations
#[derive(Error, Debug)]
pub enum Error {
    // Transport errors
    #[error("No response from server: {0}")]
    Transport(String),

    // Server-reported errors
    #[error("API error {status}: {}", .body.display_message().unwrap_or("no details"))]
    Api { status: u16, body: ErrorBody },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: the session token was rejected")]
    Unauthorized,

    // Response shape errors
    #[error("Malformed response: {0}")]
    Malformed(String),

    // Session errors
    #[error("Not logged in")]
    NotAuthenticated,

    // Local validation errors, keyed by field
    #[error("Invalid input: {}", .0.values().cloned().collect::<Vec<_>>().join("; "))]
    Invalid(BTreeMap<String, String>),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Create an API error from a status code and a decoded error body
    pub fn api(status: u16, body: ErrorBody) -> Self {
        Self::Api { status, body }
    }

    /// The server-supplied error body, if this error carries one
    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            Error::Api { body, .. } => Some(body),
            _ => None,
        }
    }
}
