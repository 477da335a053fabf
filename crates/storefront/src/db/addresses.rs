//! Saved address repository.
//!
//! A user has at most one primary address. The first address a user saves
//! becomes primary, and deleting the primary promotes the most recently
//! updated remaining address. Writes lock the owning user row first.

use sqlx::{PgConnection, PgPool};

use threadline_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::{Address, AddressInput};

const ADDRESS_COLUMNS: &str = "id, user_id, label, recipient_name, line1, line2, city, region, \
     postal_code, country, phone, is_primary, created_at, updated_at";

pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's addresses, primary first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let addresses = sqlx::query_as::<_, Address>(&format!(
            r"
            SELECT {ADDRESS_COLUMNS}
            FROM storefront.address
            WHERE user_id = $1
            ORDER BY is_primary DESC, updated_at DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(addresses)
    }

    /// Get an address owned by the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let address = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.address WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(address)
    }

    /// Save a new address.
    ///
    /// The address is made primary when requested or when it is the user's
    /// first one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        input: AddressInput,
    ) -> Result<Address, RepositoryError> {
        let input = input.normalized();
        let mut tx = self.pool.begin().await?;
        lock_owner(&mut tx, user_id).await?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM storefront.address WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;

        let make_primary = input.is_primary || existing == 0;
        if make_primary {
            clear_primary(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            r"
            INSERT INTO storefront.address
                (user_id, label, recipient_name, line1, line2, city, region,
                 postal_code, country, phone, is_primary)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(&input.label)
        .bind(&input.recipient_name)
        .bind(&input.line1)
        .bind(&input.line2)
        .bind(&input.city)
        .bind(&input.region)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.phone)
        .bind(make_primary)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "primary address changed"))?;

        tx.commit().await?;
        Ok(address)
    }

    /// Replace the fields of an address.
    ///
    /// Setting `is_primary` moves the primary flag here. Clearing it on the
    /// current primary is ignored; use another address's update or delete to
    /// move it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address isn't the user's.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        input: AddressInput,
    ) -> Result<Address, RepositoryError> {
        let input = input.normalized();
        let mut tx = self.pool.begin().await?;
        lock_owner(&mut tx, user_id).await?;

        let current: Option<bool> = sqlx::query_scalar(
            "SELECT is_primary FROM storefront.address WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(was_primary) = current else {
            return Err(RepositoryError::NotFound);
        };

        let make_primary = was_primary || input.is_primary;
        if make_primary && !was_primary {
            clear_primary(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            r"
            UPDATE storefront.address
            SET label = $3, recipient_name = $4, line1 = $5, line2 = $6, city = $7,
                region = $8, postal_code = $9, country = $10, phone = $11,
                is_primary = $12, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(&input.label)
        .bind(&input.recipient_name)
        .bind(&input.line1)
        .bind(&input.line2)
        .bind(&input.city)
        .bind(&input.region)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.phone)
        .bind(make_primary)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(address)
    }

    /// Make an address the user's primary.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address isn't the user's.
    pub async fn set_primary(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_owner(&mut tx, user_id).await?;

        clear_primary(&mut tx, user_id).await?;

        let address = sqlx::query_as::<_, Address>(&format!(
            r"
            UPDATE storefront.address
            SET is_primary = TRUE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(address)
    }

    /// Delete an address, promoting another one if it was primary.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address isn't the user's.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_owner(&mut tx, user_id).await?;

        let was_primary: Option<bool> = sqlx::query_scalar(
            "DELETE FROM storefront.address WHERE id = $1 AND user_id = $2 RETURNING is_primary",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        match was_primary {
            None => return Err(RepositoryError::NotFound),
            Some(true) => {
                sqlx::query(
                    r"
                    UPDATE storefront.address
                    SET is_primary = TRUE
                    WHERE id = (
                        SELECT id FROM storefront.address
                        WHERE user_id = $1
                        ORDER BY updated_at DESC, id DESC
                        LIMIT 1
                    )
                    ",
                )
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            }
            Some(false) => {}
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Serialize a user's address writes on their `user` row, so concurrent
/// first saves can't both see an empty address book.
async fn lock_owner(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query_scalar::<_, UserId>("SELECT id FROM storefront.user WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;
    Ok(())
}

async fn clear_primary(conn: &mut PgConnection, user_id: UserId) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE storefront.address SET is_primary = FALSE WHERE user_id = $1 AND is_primary",
    )
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(())
}
