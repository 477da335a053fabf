//! Refresh-token session repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use threadline_core::{SessionId, UserId};

use super::RepositoryError;
use crate::models::RefreshSession;

/// Repository for `storefront.session`.
pub struct SessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a new refresh session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        token_hash: &str,
        user_agent: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshSession, RepositoryError> {
        let session = sqlx::query_as::<_, RefreshSession>(
            r"
            INSERT INTO storefront.session (user_id, token_hash, user_agent, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, token_hash, user_agent, expires_at, created_at
            ",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(user_agent)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await?;
        Ok(session)
    }

    /// Find an unexpired session by token hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_active(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshSession>, RepositoryError> {
        let session = sqlx::query_as::<_, RefreshSession>(
            r"
            SELECT id, user_id, token_hash, user_agent, expires_at, created_at
            FROM storefront.session
            WHERE token_hash = $1 AND expires_at > NOW()
            ",
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;
        Ok(session)
    }

    /// Replace one session with a new one atomically.
    ///
    /// Returns `None` when the old session was already gone, which means
    /// another request rotated it first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn rotate(
        &self,
        old: SessionId,
        user_id: UserId,
        token_hash: &str,
        user_agent: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<RefreshSession>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM storefront.session WHERE id = $1 AND user_id = $2")
            .bind(old)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Ok(None);
        }

        let session = sqlx::query_as::<_, RefreshSession>(
            r"
            INSERT INTO storefront.session (user_id, token_hash, user_agent, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, token_hash, user_agent, expires_at, created_at
            ",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(user_agent)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(session))
    }

    /// Delete a session by token hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_by_hash(&self, token_hash: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.session WHERE token_hash = $1")
            .bind(token_hash)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every session of a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_all_for_user(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.session WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete expired sessions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn prune_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.session WHERE expires_at <= NOW()")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
