//! Server cart repository.
//!
//! Every write locks the user's `cart` row first, so pushes from several
//! devices and checkout are serialized per user. `updated_at` is taken from
//! `clock_timestamp()` rather than `NOW()`: a writer that waited on the lock
//! must still stamp a later time than the writer it waited for.

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use threadline_core::cart::CartLine;
use threadline_core::{CartId, UserId};

use super::RepositoryError;
use crate::models::cart::CartItemRow;
use crate::models::{Cart, CartView};

pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load the user's cart. Users without a cart row get an empty view with
    /// no `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, user_id: UserId) -> Result<CartView, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let cart = sqlx::query_as::<_, Cart>(
            "SELECT id, user_id, created_at, updated_at FROM storefront.cart WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(cart) = cart else {
            return Ok(CartView::empty());
        };

        let lines = load_lines(&mut conn, cart.id).await?;
        Ok(CartView::new(lines, Some(cart.updated_at)))
    }

    /// Replace the cart's contents with the lines `update` computes from the
    /// current cart.
    ///
    /// The cart row is created if missing and locked for the whole call, so
    /// `update` sees the latest committed cart and no other write can land
    /// between that read and the store. `update` returns normalized lines;
    /// duplicate keys violate the line index.
    ///
    /// # Errors
    ///
    /// Returns the error `update` fails with, or a `RepositoryError` if the
    /// cart can't be read or stored. Nothing is written in either case.
    pub async fn update<F, Fut, E>(&self, user_id: UserId, update: F) -> Result<CartView, E>
    where
        F: FnOnce(CartView) -> Fut,
        Fut: Future<Output = Result<Vec<CartLine>, E>>,
        E: From<RepositoryError>,
    {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        sqlx::query(
            "INSERT INTO storefront.cart (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        let cart = lock_cart(&mut tx, user_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let current = CartView::new(
            load_lines(&mut tx, cart.id).await.map_err(RepositoryError::from)?,
            Some(cart.updated_at),
        );

        let lines = update(current).await?;
        let updated_at = write_lines(&mut tx, cart.id, &lines).await?;

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(CartView::new(lines, Some(updated_at)))
    }

    /// Remove every item from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if let Some(cart) = lock_cart(&mut tx, user_id).await? {
            write_lines(&mut tx, cart.id, &[]).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Lock the user's cart row until the transaction ends.
pub(super) async fn lock_cart(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Option<Cart>, RepositoryError> {
    Ok(sqlx::query_as::<_, Cart>(
        r"
        SELECT id, user_id, created_at, updated_at
        FROM storefront.cart
        WHERE user_id = $1
        FOR UPDATE
        ",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?)
}

pub(super) async fn load_lines(
    conn: &mut PgConnection,
    cart_id: CartId,
) -> Result<Vec<CartLine>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CartItemRow>(
        r"
        SELECT product_id, variant_id, size, name, image_url, unit_price, quantity
        FROM storefront.cart_item
        WHERE cart_id = $1
        ORDER BY position
        ",
    )
    .bind(cart_id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(CartLine::from).collect())
}

/// Store `lines` as the cart's contents and stamp the cart.
pub(super) async fn write_lines(
    conn: &mut PgConnection,
    cart_id: CartId,
    lines: &[CartLine],
) -> Result<DateTime<Utc>, RepositoryError> {
    sqlx::query("DELETE FROM storefront.cart_item WHERE cart_id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;

    for (position, line) in lines.iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| RepositoryError::DataCorruption("cart too large".to_string()))?;
        let quantity = i32::try_from(line.quantity)
            .map_err(|_| RepositoryError::DataCorruption("quantity overflow".to_string()))?;

        sqlx::query(
            r"
            INSERT INTO storefront.cart_item
                (cart_id, position, product_id, variant_id, size, name, image_url,
                 unit_price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(cart_id)
        .bind(position)
        .bind(&line.product_id)
        .bind(&line.variant_id)
        .bind(&line.size)
        .bind(&line.name)
        .bind(&line.image_url)
        .bind(line.unit_price)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
    }

    let updated_at: DateTime<Utc> = sqlx::query_scalar(
        "UPDATE storefront.cart SET updated_at = clock_timestamp() WHERE id = $1 RETURNING updated_at",
    )
    .bind(cart_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(updated_at)
}
