//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! tl-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (fallback `DATABASE_URL`)
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded in
//! the storefront crate. The admin reads and writes the same schema and has
//! no migrations of its own.

use threadline_storefront::db;

use super::{CommandError, storefront_database_url};

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns `CommandError` if the URL is missing, the database is
/// unreachable, or a migration fails.
pub async fn storefront() -> Result<(), CommandError> {
    let database_url = storefront_database_url()?;

    tracing::info!("Connecting to storefront database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running storefront migrations...");
    db::MIGRATOR.run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
