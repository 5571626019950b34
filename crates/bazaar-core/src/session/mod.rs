//! Session management: the authenticated-identity lifecycle of the client.
//!
//! ## State Machine
//!
//! ```text
//!                 login ok
//!   Anonymous ────────────────► Authenticated
//!       ▲  │                          │
//!       │  │ login failed /           │ logout
//!       │  │ register (any outcome)   │
//!       │  ▼                          │
//!   Anonymous ◄───────────────────────┘
//!
//!   startup: token + identity in storage ─► Authenticated (no network)
//!            otherwise                    ─► Anonymous
//! ```
//!
//! The [`SessionManager`] is the only writer. Views read a [`Session`]
//! snapshot or subscribe to changes through a `tokio::sync::watch` channel.

mod manager;
mod state;

pub use manager::*;
pub use state::*;
