//! Database operations for the storefront `PostgreSQL` schema.
//!
//! ## Tables (`storefront` schema)
//!
//! - `user` / `account` - Identities and linked providers (credentials, Google)
//! - `session` - Refresh-token sessions (SHA-256 of the token only)
//! - `address` - Saved addresses, at most one primary per user
//! - `cart` / `cart_item` - Server copy of the shopper's cart
//! - `order` / `order_item` / `delivery` / `pickup` - Immutable order snapshots
//!
//! Server sessions for the OAuth handshake live in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p threadline-cli -- migrate
//! ```

pub mod addresses;
pub mod carts;
pub mod orders;
pub mod sessions;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use carts::CartRepository;
pub use orders::{CreateOrderError, NewFulfillment, NewOrder, OrderRepository};
pub use sessions::SessionRepository;
pub use users::UserRepository;

/// Embedded storefront migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-violation to `Conflict`, everything else to `Database`.
    pub(crate) fn conflict_on_unique(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(what.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
