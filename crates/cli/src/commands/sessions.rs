//! Refresh session maintenance.

use threadline_storefront::db::{self, SessionRepository};

use super::{CommandError, storefront_database_url};

/// Delete refresh sessions past their expiry.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or the delete fails.
pub async fn prune() -> Result<(), CommandError> {
    let database_url = storefront_database_url()?;
    let pool = db::create_pool(&database_url).await?;

    let removed = SessionRepository::new(&pool).prune_expired().await?;
    tracing::info!(removed, "Expired sessions pruned");
    Ok(())
}
