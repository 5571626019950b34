//! Shared types for bazaar-core.
//!
//! These types mirror the JSON payloads of the marketplace backend. They are
//! used by the API client, the session manager and the CLI.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File extensions the backend accepts for listing attachments.
pub const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "mp4", "mov"];

/// Maximum request body the backend accepts (16 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Identity record issued by the server on login.
///
/// Only `id` and `username` are relied on. Any other profile fields the
/// backend sends are kept in `profile` so they survive persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub profile: serde_json::Map<String, serde_json::Value>,
}

impl User {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: None,
            profile: serde_json::Map::new(),
        }
    }
}

/// User summary returned by registration (the account has no session yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Payloads
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response. Every field is optional on the wire; the session manager
/// decides whether the shape counts as success.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<RegisteredUser>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl RegisterResponse {
    /// View the failure fields of this payload as an error body.
    pub fn error_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.error.clone(),
            message: self.message.clone(),
            fields: self.fields.clone(),
        }
    }
}

/// Error payload shared by every endpoint.
///
/// `fields` carries field-keyed validation messages, e.g.
/// `{"username": "This username is already taken"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl ErrorBody {
    /// Best human-readable message: `error`, then `message`. Blank strings
    /// are skipped.
    pub fn display_message(&self) -> Option<&str> {
        [self.error.as_deref(), self.message.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

/// Plain `{"message": ...}` acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub message: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Listings
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub is_rental: bool,
    /// Rental period in hours. Only present on the detail endpoint.
    #[serde(default)]
    pub rental_duration: Option<i64>,
    /// Comma-separated upload names. Only present on the detail endpoint.
    #[serde(default)]
    pub images: Option<String>,
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub seller: String,
    pub created_at: NaiveDateTime,
}

impl Listing {
    /// Upload names of the attached images, in order.
    pub fn image_names(&self) -> Vec<&str> {
        self.images
            .as_deref()
            .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    pub fn video_name(&self) -> Option<&str> {
        self.video.as_deref().filter(|v| !v.is_empty())
    }
}

/// Search filters for the listing index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListingQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
}

impl ListingQuery {
    pub fn is_empty(&self) -> bool {
        self.search.is_none()
            && self.category.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
    }
}

/// A listing to publish, with local files to attach.
#[derive(Debug, Clone, Default)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub is_rental: bool,
    pub rental_duration: Option<u32>,
    pub category: Option<String>,
    pub images: Vec<PathBuf>,
    pub video: Option<PathBuf>,
}

impl NewListing {
    /// Check the listing against the rules the backend enforces, returning
    /// field-keyed messages for every violation.
    pub fn validate(&self) -> std::result::Result<(), BTreeMap<String, String>> {
        let mut fields = BTreeMap::new();

        if self.title.trim().is_empty() {
            fields.insert("title".to_string(), "Title is required".to_string());
        }
        if self.description.trim().is_empty() {
            fields.insert("description".to_string(), "Description is required".to_string());
        }
        if !self.price.is_finite() || self.price < 0.0 {
            fields.insert("price".to_string(), "Price must be a non-negative number".to_string());
        }
        if let Some(bad) = self.images.iter().find(|p| !is_allowed_upload(p)) {
            fields.insert(
                "images".to_string(),
                format!("Unsupported file type: {}", bad.display()),
            );
        }
        if let Some(video) = self.video.as_deref().filter(|p| !is_allowed_upload(p)) {
            fields.insert(
                "video".to_string(),
                format!("Unsupported file type: {}", video.display()),
            );
        }

        if fields.is_empty() { Ok(()) } else { Err(fields) }
    }

    /// Every attached file, images first.
    pub fn attachments(&self) -> impl Iterator<Item = (&'static str, &Path)> {
        self.images
            .iter()
            .map(|p| ("images", p.as_path()))
            .chain(self.video.iter().map(|p| ("video", p.as_path())))
    }
}

/// Whether a file name carries an extension the backend accepts.
pub fn is_allowed_upload(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ALLOWED_UPLOAD_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub listing_id: i64,
    pub content: String,
    pub timestamp: NaiveDateTime,
    pub sender: String,
    pub receiver: String,
}

impl Message {
    /// The other participant's id and username, from `me`'s point of view.
    pub fn counterpart(&self, me: i64) -> (i64, &str) {
        if self.sender_id == me {
            (self.receiver_id, &self.receiver)
        } else {
            (self.sender_id, &self.sender)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub receiver_id: i64,
    pub listing_id: i64,
    pub content: String,
}

/// Group messages into conversations keyed by listing id.
///
/// Each conversation is ordered newest first, matching the backend's order.
pub fn group_by_listing(messages: &[Message]) -> BTreeMap<i64, Vec<&Message>> {
    let mut conversations: BTreeMap<i64, Vec<&Message>> = BTreeMap::new();
    for msg in messages {
        conversations.entry(msg.listing_id).or_default().push(msg);
    }
    for thread in conversations.values_mut() {
        thread.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    }
    conversations
}
