//! User and linked-account repository.

use sqlx::PgPool;

use threadline_core::{AuthProvider, Email, UserId};

use super::RepositoryError;
use crate::models::User;

const USER_COLUMNS: &str =
    "id, email, name, phone, image_url, email_verified, created_at, updated_at";

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Create a new user with a credentials account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_with_password(
        &self,
        email: &Email,
        name: &str,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO storefront.user (email, name) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "email already exists"))?;

        sqlx::query(
            r"
            INSERT INTO storefront.account (user_id, provider, provider_account_id, password_hash)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(user.id)
        .bind(AuthProvider::Credentials)
        .bind(email.as_str())
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(user)
    }

    /// Get a user and their password hash by email.
    ///
    /// Returns `None` if the user doesn't exist or has no credentials account
    /// (e.g. signed up with Google only).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            user: User,
            password_hash: Option<String>,
        }

        let row = sqlx::query_as::<_, Row>(
            r"
            SELECT u.id, u.email, u.name, u.phone, u.image_url, u.email_verified,
                   u.created_at, u.updated_at, a.password_hash
            FROM storefront.user u
            JOIN storefront.account a ON a.user_id = u.id AND a.provider = 'credentials'
            WHERE u.email = $1
            ",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.and_then(|r| r.password_hash.map(|hash| (r.user, hash))))
    }

    /// Find the user linked to a provider subject.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_provider(
        &self,
        provider: AuthProvider,
        provider_account_id: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r"
            SELECT u.id, u.email, u.name, u.phone, u.image_url, u.email_verified,
                   u.created_at, u.updated_at
            FROM storefront.user u
            JOIN storefront.account a ON a.user_id = u.id
            WHERE a.provider = $1 AND a.provider_account_id = $2
            ",
        )
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Create a user from an OAuth profile and link the provider account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_with_provider(
        &self,
        email: &Email,
        name: &str,
        image_url: Option<&str>,
        provider: AuthProvider,
        provider_account_id: &str,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r"
            INSERT INTO storefront.user (email, name, image_url, email_verified)
            VALUES ($1, $2, $3, TRUE)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(email)
        .bind(name)
        .bind(image_url)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "email already exists"))?;

        sqlx::query(
            r"
            INSERT INTO storefront.account (user_id, provider, provider_account_id)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(user.id)
        .bind(provider)
        .bind(provider_account_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "account already linked"))?;

        tx.commit().await?;

        Ok(user)
    }

    /// Link a provider account to an existing user and mark the email verified.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has an account
    /// for this provider or the subject is linked elsewhere.
    pub async fn link_provider(
        &self,
        user_id: UserId,
        provider: AuthProvider,
        provider_account_id: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO storefront.account (user_id, provider, provider_account_id)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(user_id)
        .bind(provider)
        .bind(provider_account_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "account already linked"))?;

        sqlx::query(
            "UPDATE storefront.user SET email_verified = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Update profile fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        name: &str,
        phone: Option<&str>,
    ) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(&format!(
            r"
            UPDATE storefront.user
            SET name = $2, phone = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(name)
        .bind(phone)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }
}
