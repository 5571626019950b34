//! Conversation commands.

use anyhow::Result;
use bazaar_core::types::{Message, NewMessage, group_by_listing};
use colored::Colorize;

use super::{Connection, explain};
use crate::cli::{MessagesAction, MessagesCommand};
use crate::config::Config;

/// Handle messages commands
pub async fn execute(cmd: MessagesCommand, config: &Config) -> Result<()> {
    let conn = Connection::open(config)?;
    match cmd.action {
        MessagesAction::List { listing } => list(&conn, listing).await,
        MessagesAction::Send {
            listing_id,
            receiver_id,
            content,
        } => {
            let msg = NewMessage {
                receiver_id,
                listing_id,
                content,
            };
            send(&conn, &msg).await
        }
    }
}

async fn list(conn: &Connection, only: Option<i64>) -> Result<()> {
    let messages = conn.client.list_messages().await.map_err(explain)?;
    // A message list is only served with a token, so the user is known here
    let me = conn
        .session
        .snapshot()
        .current_user()
        .map(|u| u.id)
        .unwrap_or_default();

    let conversations = group_by_listing(&messages);
    let mut shown = 0;
    for (listing_id, thread) in conversations {
        if only.is_some_and(|id| id != listing_id) {
            continue;
        }
        shown += 1;

        let (other_id, other) = thread
            .first()
            .copied()
            .map(|m| m.counterpart(me))
            .unwrap_or((0, ""));
        println!(
            "{} {} with {} (id {})",
            "Listing".bold(),
            listing_id.to_string().bold(),
            other.cyan(),
            other_id
        );
        println!("{}", "─".repeat(40));
        for msg in thread {
            println!("{}", format_line(msg, me));
        }
        println!();
    }

    if shown == 0 {
        println!("{}", "No messages.".yellow());
    }
    Ok(())
}

async fn send(conn: &Connection, msg: &NewMessage) -> Result<()> {
    let resp = conn.client.send_message(msg).await.map_err(explain)?;
    println!(
        "{} {}",
        "✓".green(),
        resp.message.as_deref().unwrap_or("Message sent")
    );
    Ok(())
}

fn format_line(msg: &Message, me: i64) -> String {
    let who = if msg.sender_id == me {
        "you".to_string()
    } else {
        msg.sender.clone()
    };
    format!(
        "  [{}] {}: {}",
        msg.timestamp.format("%Y-%m-%d %H:%M"),
        who,
        msg.content
    )
}
