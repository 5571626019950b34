//! bazaar - marketplace client CLI
//!
//! Browse listings, publish your own and talk to other users. The account
//! session is kept on disk between invocations.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("bazaar=info".parse()?)
                .add_directive("bazaar_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api.url = url;
    }

    // Execute command
    match cli.command {
        Commands::Auth(cmd) => commands::auth::execute(cmd, &config).await,
        Commands::Listings(cmd) => commands::listings::execute(cmd, &config).await,
        Commands::Messages(cmd) => commands::messages::execute(cmd, &config).await,
        Commands::Config { init } => show_config(&config, init),
        Commands::Version => {
            println!("bazaar {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn show_config(config: &Config, init: bool) -> Result<()> {
    let path = Config::config_path();
    if init {
        config.save_to(&path)?;
        println!("{} Wrote {}", "✓".green(), path.display());
    }

    println!("{}", "Configuration".bold());
    println!("{}", "─".repeat(40));
    println!("File:      {}", path.display());
    println!("API URL:   {}", config.api.url.cyan());
    println!("Timeout:   {}s", config.api.timeout_secs);
    println!("Data:      {}", config.paths.data_dir.display());
    println!("Session:   {}", config.paths.session_dir.display());
    Ok(())
}
