//! bazaar-core - Core library for the bazaar marketplace client
//!
//! This crate provides the pieces shared by every bazaar front end:
//!
//! - **session**: authenticated-identity lifecycle (login, register, logout,
//!   restore) with snapshot and subscription access
//! - **client**: HTTP API client for auth, listings and messaging
//! - **storage**: key-value persistence for the session token and identity
//! - **types**: wire types of the marketplace backend

#[cfg(feature = "client")]
pub mod client;
pub mod error;
pub mod session;
pub mod storage;
pub mod types;

// Re-export commonly used types
#[cfg(feature = "client")]
pub use client::ApiClient;
pub use error::{Error, Result};
pub use session::{AuthBackend, AuthError, Session, SessionManager, SessionState};
pub use storage::{FileStorage, MemoryStorage, Storage};
