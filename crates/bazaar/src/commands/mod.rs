//! Command implementations for the bazaar CLI.
//!
//! Each submodule implements the logic for a command group. They all share
//! one [`Connection`]: the restored session plus an API client that follows it.

pub mod auth;
pub mod listings;
pub mod messages;

use anyhow::{Context, Result, anyhow};
use bazaar_core::{ApiClient, Error, FileStorage, SessionManager};
use colored::Colorize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;

/// Session manager and API client for one CLI invocation.
pub struct Connection {
    pub session: Arc<SessionManager>,
    pub client: ApiClient,
}

impl Connection {
    /// Restore the persisted session and build a client that attaches its token.
    pub fn open(config: &Config) -> Result<Self> {
        let client = ApiClient::with_timeout(
            config.api.url.clone(),
            Duration::from_secs(config.api.timeout_secs),
        )
        .context("Failed to create API client")?;

        let storage = Arc::new(FileStorage::new(config.paths.session_dir.clone()));
        let session = Arc::new(SessionManager::restore(Arc::new(client.clone()), storage));
        let client = client.with_session(session.subscribe());
        debug!(
            "Connected to {} (session: {:?})",
            client.base_url(),
            session.snapshot().state()
        );

        Ok(Self { session, client })
    }
}

/// Print field-keyed validation messages.
pub fn print_fields(fields: &BTreeMap<String, String>) {
    for (field, message) in fields {
        eprintln!("  {} {}: {}", "✗".red(), field.yellow(), message);
    }
}

/// Turn a client error into a user-facing one.
pub fn explain(err: Error) -> anyhow::Error {
    match err {
        Error::NotAuthenticated => {
            anyhow!("Not logged in. Run `bazaar auth login <username>` first.")
        }
        Error::Unauthorized => anyhow!(
            "The server rejected the stored session. Run `bazaar auth login <username>` again."
        ),
        Error::Invalid(fields) => {
            print_fields(&fields);
            anyhow!("Invalid input")
        }
        Error::Api { status, body } => match body.display_message() {
            Some(msg) => anyhow!("{} (HTTP {})", msg, status),
            None => anyhow!("Request failed with HTTP {}", status),
        },
        other => anyhow::Error::new(other),
    }
}
