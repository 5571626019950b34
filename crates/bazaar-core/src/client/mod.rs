//! HTTP client for the marketplace backend.
//!
//! Covers authentication, listings and messaging. Requests to endpoints
//! that need a logged-in user read the bearer token from a session
//! subscription at send time, so a client built once keeps following
//! logins and logouts.
//!
//! # Usage
//!
//! ```rust,no_run
//! use bazaar_core::client::ApiClient;
//! use bazaar_core::types::ListingQuery;
//!
//! #[tokio::main]
//! async fn main() -> bazaar_core::Result<()> {
//!     let client = ApiClient::new("http://localhost:5000")?;
//!     let listings = client.list_listings(&ListingQuery::default()).await?;
//!     println!("{} listings", listings.len());
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use crate::session::{AuthBackend, Session};
use crate::types::*;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Backend address used when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Request timeout used by [`ApiClient::new`].
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// API client for the marketplace backend
#[derive(Clone)]
pub struct ApiClient {
    /// Base URL without trailing slash
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
    /// Session to take the bearer token from
    session: Option<watch::Receiver<Session>>,
}

impl ApiClient {
    /// Create a client with the default timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            session: None,
        })
    }

    /// Attach a session; authenticated calls will carry its token
    pub fn with_session(mut self, session: watch::Receiver<Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Public URL of an uploaded image or video
    pub fn upload_url(&self, name: &str) -> String {
        format!("{}/api/uploads/{}", self.base_url, name)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Listing Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// List listings, optionally filtered
    pub async fn list_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>> {
        let mut req = self.client.get(self.url("/api/listings"));
        if !query.is_empty() {
            req = req.query(query);
        }
        self.send(req, "/api/listings", false).await
    }

    /// Get a listing by ID
    pub async fn get_listing(&self, id: i64) -> Result<Option<Listing>> {
        let path = format!("/api/listings/{}", id);
        let result: Result<Listing> = self.send(self.client.get(self.url(&path)), &path, false).await;
        match result {
            Ok(l) => Ok(Some(l)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Publish a listing with its attachments
    pub async fn create_listing(&self, listing: &NewListing) -> Result<StatusResponse> {
        let token = self.bearer()?;
        listing.validate().map_err(Error::Invalid)?;

        let mut form = Form::new()
            .text("title", listing.title.clone())
            .text("description", listing.description.clone())
            .text("price", listing.price.to_string());

        // The backend treats any non-empty value as true
        if listing.is_rental {
            form = form.text("is_rental", "true");
        }
        if let Some(hours) = listing.rental_duration {
            form = form.text("rental_duration", hours.to_string());
        }
        if let Some(ref category) = listing.category {
            form = form.text("category", category.clone());
        }

        // Sizes are checked from metadata so oversized files are never read
        let mut total: u64 = 0;
        for (field, file) in listing.attachments() {
            total += tokio::fs::metadata(file).await?.len();
            if total > MAX_UPLOAD_BYTES {
                let mut fields = BTreeMap::new();
                fields.insert(
                    field.to_string(),
                    "Attachments exceed the 16 MiB upload limit".to_string(),
                );
                return Err(Error::Invalid(fields));
            }
        }

        for (field, file) in listing.attachments() {
            let bytes = tokio::fs::read(file).await?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| field.to_string());
            form = form.part(field, Part::bytes(bytes).file_name(name));
        }

        let req = self
            .client
            .post(self.url("/api/listings"))
            .bearer_auth(token)
            .multipart(form);
        self.send(req, "/api/listings", true).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Message Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Messages sent or received by the current user, newest first
    pub async fn list_messages(&self) -> Result<Vec<Message>> {
        self.get_authed("/api/messages").await
    }

    /// Send a message about a listing
    pub async fn send_message(&self, msg: &NewMessage) -> Result<StatusResponse> {
        if msg.content.trim().is_empty() {
            let mut fields = BTreeMap::new();
            fields.insert("content".to_string(), "Message cannot be empty".to_string());
            return Err(Error::Invalid(fields));
        }
        self.post_authed("/api/messages", msg).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // HTTP Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Current token, or `NotAuthenticated` without touching the network
    fn bearer(&self) -> Result<String> {
        self.session
            .as_ref()
            .and_then(|rx| rx.borrow().auth_token().map(str::to_string))
            .ok_or(Error::NotAuthenticated)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let req = self.client.post(self.url(path)).json(body);
        self.send(req, path, false).await
    }

    async fn get_authed<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let token = self.bearer()?;
        let req = self.client.get(self.url(path)).bearer_auth(token);
        self.send(req, path, true).await
    }

    async fn post_authed<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let token = self.bearer()?;
        let req = self.client.post(self.url(path)).bearer_auth(token).json(body);
        self.send(req, path, true).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        path: &str,
        authenticated: bool,
    ) -> Result<T> {
        debug!("API request: {}", path);

        let resp = req
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", path, e)))?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .json()
                .await
                .map_err(|e| Error::Malformed(format!("{}: {}", path, e)));
        }

        debug!("API error {} for {}", status, path);
        if status == StatusCode::UNAUTHORIZED && authenticated {
            return Err(Error::Unauthorized);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(path.to_string()));
        }

        let text = resp.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_default();
        Err(Error::api(status.as_u16(), body))
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn login(&self, req: &LoginRequest) -> Result<LoginResponse> {
        self.post_json("/api/login", req).await
    }

    async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse> {
        self.post_json("/api/register", req).await
    }
}
