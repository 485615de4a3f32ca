//! Stride CLI - Database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! stride migrate
//!
//! # Delete guest sessions past their expiry (their carts go with them)
//! stride guests purge
//! ```
//!
//! Both commands read `STOREFRONT_DATABASE_URL`, falling back to
//! `DATABASE_URL`. A `.env` file is honoured.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "stride")]
#[command(author, version, about = "Stride CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Manage guest sessions
    Guests {
        #[command(subcommand)]
        action: GuestsAction,
    },
}

#[derive(Subcommand)]
enum GuestsAction {
    /// Delete expired guest sessions and their carts
    Purge,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Guests { action } => match action {
            GuestsAction::Purge => commands::guests::purge().await?,
        },
    }
    Ok(())
}
