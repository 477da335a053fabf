//! Subcommand implementations.

pub mod cms;
pub mod migrate;
pub mod seed;
pub mod sessions;

use secrecy::SecretString;
use thiserror::Error;

use threadline_admin::config::ConfigError;
use threadline_admin::services::CatalogError;
use threadline_storefront::db::RepositoryError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storefront database URL, falling back to `DATABASE_URL`.
fn storefront_database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("STOREFRONT_DATABASE_URL"))
}
