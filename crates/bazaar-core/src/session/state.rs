//! Session snapshot and auth error types.

use crate::error::Error;
use crate::types::{ErrorBody, User};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

/// Fallback display string when a login fails without a server message.
pub const LOGIN_FALLBACK: &str = "An error occurred during login";

/// Fallback display string when a registration fails without a server message.
pub const REGISTER_FALLBACK: &str = "An error occurred during registration";

/// The two states a session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

/// Identity and bearer token, always held together.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub user: User,
    pub token: String,
}

/// Point-in-time view of the client's authentication state.
///
/// The user and token share one `Option`, so a session can never carry one
/// without the other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    credentials: Option<Credentials>,
    last_error: Option<AuthError>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.credentials.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn current_user(&self) -> Option<&User> {
        self.credentials.as_ref().map(|c| &c.user)
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.token.as_str())
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Error left by the most recent failed login or registration.
    pub fn last_error(&self) -> Option<&AuthError> {
        self.last_error.as_ref()
    }

    /// Same credentials, different error.
    pub(crate) fn with_error(&self, last_error: Option<AuthError>) -> Self {
        Self {
            credentials: self.credentials.clone(),
            last_error,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Why an auth operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No response reached the client.
    Transport,
    /// The server answered and refused.
    Rejected { status: u16 },
    /// The server answered with a payload missing required fields.
    Malformed,
    /// Credentials could not be persisted.
    Storage,
    /// A newer call of the same kind was issued; this result was dropped.
    Superseded,
}

/// Failure of a login or registration, ready for display.
///
/// `fields` holds field-keyed validation messages from the backend so views
/// can flag the offending input without inspecting `message`.
#[derive(Debug, Clone, PartialEq, ThisError)]
#[error("{message}")]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn superseded() -> Self {
        Self::new(AuthErrorKind::Superseded, "Superseded by a newer request")
    }

    /// Build from a backend error body, preferring its message over `fallback`.
    pub fn from_body(kind: AuthErrorKind, body: &ErrorBody, fallback: &str) -> Self {
        Self {
            kind,
            message: body.display_message().unwrap_or(fallback).to_string(),
            fields: body.fields.clone(),
        }
    }

    /// Collapse a client error into an auth failure.
    pub fn from_client_error(err: &Error, fallback: &str) -> Self {
        match err {
            Error::Api { status, body } => {
                Self::from_body(AuthErrorKind::Rejected { status: *status }, body, fallback)
            }
            Error::NotFound(_) => Self::new(AuthErrorKind::Rejected { status: 404 }, fallback),
            Error::Unauthorized => Self::new(AuthErrorKind::Rejected { status: 401 }, fallback),
            Error::Malformed(_) | Error::Serialization(_) => {
                Self::new(AuthErrorKind::Malformed, fallback)
            }
            Error::Storage(_) | Error::Io(_) => Self::new(AuthErrorKind::Storage, fallback),
            Error::Transport(_) | Error::NotAuthenticated | Error::Invalid(_) | Error::Other(_) => {
                Self::new(AuthErrorKind::Transport, fallback)
            }
        }
    }

    /// Message for one input field, if the backend flagged it.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn is_superseded(&self) -> bool {
        self.kind == AuthErrorKind::Superseded
    }
}
