//! Threadline CLI - database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! tl-cli migrate
//!
//! # Create colors, sizes, categories and subcategories from YAML
//! tl-cli seed catalog catalog.yaml
//!
//! # Delete expired refresh sessions
//! tl-cli sessions prune
//!
//! # Print the CMS schema descriptor
//! tl-cli cms schema > schema.json
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tl-cli")]
#[command(author, version, about = "Threadline CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Seed data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage refresh sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Content platform tools
    Cms {
        #[command(subcommand)]
        action: CmsAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Create catalog documents from a YAML file
    Catalog {
        /// Path to the YAML file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// Delete expired refresh sessions
    Prune,
}

#[derive(Subcommand)]
enum CmsAction {
    /// Print the document schema as JSON
    Schema,
}

#[tokio::main]
async fn main() {
    // Initialize tracing (stderr, so `cms schema` output stays clean)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => commands::seed::catalog(&file).await?,
        },
        Commands::Sessions { action } => match action {
            SessionsAction::Prune => commands::sessions::prune().await?,
        },
        Commands::Cms { action } => match action {
            CmsAction::Schema => commands::cms::schema()?,
        },
    }
    Ok(())
}
