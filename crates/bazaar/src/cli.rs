//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Marketplace client
///
/// Browse listings, message sellers and manage your account session.
#[derive(Parser, Debug)]
#[command(name = "bazaar")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Override the backend URL for this invocation
    #[arg(long, global = true, env = "BAZAAR_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Account session (login, register, logout, status)
    Auth(AuthCommand),

    /// Browse and publish listings
    Listings(ListingsCommand),

    /// Conversations with buyers and sellers
    Messages(MessagesCommand),

    /// Show or initialise the configuration file
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Authentication Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct AuthCommand {
    #[command(subcommand)]
    pub action: AuthAction,
}

#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Log in and remember the session
    Login {
        /// Account username
        username: String,

        /// Password (prompted when omitted)
        #[arg(short, long, env = "BAZAAR_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account (log in afterwards)
    Register {
        /// Account username
        username: String,

        /// Account email
        email: String,

        /// Password (prompted with confirmation when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the current session
    Status,
}

// ─────────────────────────────────────────────────────────────────────────────
// Listing Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ListingsCommand {
    #[command(subcommand)]
    pub action: ListingsAction,
}

#[derive(Subcommand, Debug)]
pub enum ListingsAction {
    /// List listings
    List {
        /// Free-text search
        #[arg(short, long)]
        search: Option<String>,

        /// Category filter
        #[arg(short, long)]
        category: Option<String>,

        /// Minimum price
        #[arg(long)]
        min_price: Option<f64>,

        /// Maximum price
        #[arg(long)]
        max_price: Option<f64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one listing
    Show {
        /// Listing ID
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Publish a listing (requires login)
    Create {
        /// Title
        #[arg(short, long)]
        title: String,

        /// Description
        #[arg(short, long)]
        description: String,

        /// Price
        #[arg(short, long)]
        price: f64,

        /// Category
        #[arg(short, long)]
        category: Option<String>,

        /// Offer as a rental for this many hours
        #[arg(long, value_name = "HOURS")]
        rental_hours: Option<u32>,

        /// Image to attach (repeatable)
        #[arg(short, long = "image")]
        images: Vec<PathBuf>,

        /// Video to attach
        #[arg(long)]
        video: Option<PathBuf>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Message Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct MessagesCommand {
    #[command(subcommand)]
    pub action: MessagesAction,
}

#[derive(Subcommand, Debug)]
pub enum MessagesAction {
    /// List conversations, grouped by listing
    List {
        /// Only show the conversation about this listing
        #[arg(short, long)]
        listing: Option<i64>,
    },

    /// Send a message about a listing
    Send {
        /// Listing the message is about
        listing_id: i64,

        /// Recipient user ID
        receiver_id: i64,

        /// Message text
        content: String,
    },
}
