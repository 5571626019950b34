//! Listing commands: browse the index, inspect one listing, publish.

use anyhow::{Result, bail};
use bazaar_core::types::{Listing, ListingQuery, NewListing};
use colored::Colorize;

use super::{Connection, explain};
use crate::cli::{ListingsAction, ListingsCommand};
use crate::config::Config;

/// Handle listings commands
pub async fn execute(cmd: ListingsCommand, config: &Config) -> Result<()> {
    let conn = Connection::open(config)?;
    match cmd.action {
        ListingsAction::List {
            search,
            category,
            min_price,
            max_price,
            json,
        } => {
            let query = ListingQuery {
                search,
                category,
                min_price,
                max_price,
            };
            list(&conn, &query, json).await
        }
        ListingsAction::Show { id, json } => show(&conn, id, json).await,
        ListingsAction::Create {
            title,
            description,
            price,
            category,
            rental_hours,
            images,
            video,
        } => {
            let listing = NewListing {
                title,
                description,
                price,
                is_rental: rental_hours.is_some(),
                rental_duration: rental_hours,
                category,
                images,
                video,
            };
            create(&conn, &listing).await
        }
    }
}

async fn list(conn: &Connection, query: &ListingQuery, json: bool) -> Result<()> {
    let listings = conn.client.list_listings(query).await.map_err(explain)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    if listings.is_empty() {
        println!("{}", "No listings found.".yellow());
        return Ok(());
    }

    println!("{}", "Listings".bold());
    println!("{}", "─".repeat(72));
    for listing in &listings {
        println!(
            "{:>5}  {:<36} {:>10}  {}",
            listing.id.to_string().dimmed(),
            truncate(&listing.title, 36),
            format_price(listing).green(),
            listing.seller.cyan()
        );
    }
    println!();
    println!("{} listing(s)", listings.len());

    Ok(())
}

async fn show(conn: &Connection, id: i64, json: bool) -> Result<()> {
    let Some(listing) = conn.client.get_listing(id).await.map_err(explain)? else {
        bail!("Listing {} not found", id);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("{}", listing.title.bold());
    println!("{}", "─".repeat(40));
    println!("ID:        {}", listing.id);
    println!("Price:     {}", format_price(&listing).green());
    if let Some(ref category) = listing.category {
        println!("Category:  {}", category);
    }
    println!("Seller:    {}", listing.seller.cyan());
    println!("Posted:    {}", listing.created_at.format("%Y-%m-%d %H:%M"));
    println!();
    println!("{}", listing.description);

    let images = listing.image_names();
    if !images.is_empty() || listing.video_name().is_some() {
        println!();
        println!("{}", "Media".bold());
        for name in images {
            println!("  {} {}", "image".dimmed(), conn.client.upload_url(name));
        }
        if let Some(name) = listing.video_name() {
            println!("  {} {}", "video".dimmed(), conn.client.upload_url(name));
        }
    }

    Ok(())
}

async fn create(conn: &Connection, listing: &NewListing) -> Result<()> {
    println!("{} Publishing '{}'...", "→".cyan(), listing.title);
    let resp = conn.client.create_listing(listing).await.map_err(explain)?;

    println!(
        "{} {}",
        "✓".green(),
        resp.message.as_deref().unwrap_or("Listing created")
    );
    Ok(())
}

fn format_price(listing: &Listing) -> String {
    match (listing.is_rental, listing.rental_duration) {
        (true, Some(hours)) => format!("${:.2}/{}h", listing.price, hours),
        (true, None) => format!("${:.2} rent", listing.price),
        _ => format!("${:.2}", listing.price),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
