//! Account session commands.
//!
//! The session is persisted under the configured session directory and
//! restored on every invocation without contacting the server.

use anyhow::{Result, bail};
use bazaar_core::AuthError;
use colored::Colorize;
use dialoguer::Password;

use super::{Connection, print_fields};
use crate::cli::{AuthAction, AuthCommand};
use crate::config::Config;

/// Handle auth commands
pub async fn execute(cmd: AuthCommand, config: &Config) -> Result<()> {
    let conn = Connection::open(config)?;
    match cmd.action {
        AuthAction::Login { username, password } => login(&conn, &username, password).await,
        AuthAction::Register {
            username,
            email,
            password,
        } => register(&conn, &username, &email, password).await,
        AuthAction::Logout => logout(&conn),
        AuthAction::Status => status(&conn, config),
    }
}

async fn login(conn: &Connection, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => Password::new().with_prompt("Password").interact()?,
    };

    println!("{} Logging in as '{}'...", "→".cyan(), username);
    match conn.session.login(username, &password).await {
        Ok(user) => {
            println!("{} Logged in as {} (id {})", "✓".green(), user.username.cyan(), user.id);
            Ok(())
        }
        Err(e) => fail(e),
    }
}

async fn register(
    conn: &Connection,
    username: &str,
    email: &str,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => Password::new()
            .with_prompt("Password")
            .with_confirmation("Confirm password", "Passwords do not match")
            .interact()?,
    };

    println!("{} Creating account '{}'...", "→".cyan(), username);
    match conn.session.register(username, email, &password).await {
        Ok(resp) => {
            println!(
                "{} {}",
                "✓".green(),
                resp.message.as_deref().unwrap_or("Account created")
            );
            println!(
                "  Log in with {}",
                format!("bazaar auth login {}", username).cyan()
            );
            Ok(())
        }
        Err(e) => fail(e),
    }
}

fn logout(conn: &Connection) -> Result<()> {
    let was_logged_in = conn.session.snapshot().is_authenticated();
    conn.session.logout();

    if was_logged_in {
        println!("{} Logged out successfully!", "✓".green());
    } else {
        println!("{} Not logged in.", "✗".red());
    }
    Ok(())
}

fn status(conn: &Connection, config: &Config) -> Result<()> {
    let session = conn.session.snapshot();

    println!("{}", "Session Status".bold());
    println!("{}", "─".repeat(40));
    println!("Server:    {}", conn.client.base_url().cyan());

    match (session.current_user(), session.auth_token()) {
        (Some(user), Some(token)) => {
            let prefix: String = token.chars().take(8).collect();
            println!("User:      {} (id {})", user.username.green(), user.id);
            if let Some(ref email) = user.email {
                println!("Email:     {}", email);
            }
            println!("Token:     {} ({}...)", "Present".green(), prefix.yellow());
            println!(
                "           {}",
                "Restored from disk; the server checks it on the next request".dimmed()
            );
        }
        _ => println!("User:      {}", "Not logged in".red()),
    }
    println!("Storage:   {}", config.paths.session_dir.display());

    Ok(())
}

fn fail(err: AuthError) -> Result<()> {
    if err.is_superseded() {
        bail!("Request was superseded by a newer one");
    }
    print_fields(&err.fields);
    bail!("{}", err.message)
}
