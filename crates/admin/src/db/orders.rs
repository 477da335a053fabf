//! Order repository for the back-office.

use sqlx::{PgConnection, PgPool};

use threadline_core::{OrderId, OrderStatus};

use super::RepositoryError;
use crate::models::{Delivery, OrderDetail, OrderItem, OrderListQuery, OrderPage, OrderSummary, Pickup};

const SUMMARY_SELECT: &str = r"
    SELECT o.id, o.user_id, u.email AS customer_email, u.name AS customer_name,
           o.status, o.fulfillment_method, o.subtotal, o.shipping, o.total, o.currency,
           (SELECT COUNT(*) FROM storefront.order_item i WHERE i.order_id = o.id) AS item_count,
           o.created_at, o.updated_at
    FROM storefront.order o
    JOIN storefront.user u ON u.id = o.user_id
";

const ITEM_COLUMNS: &str =
    "id, product_id, variant_id, size, name, image_url, unit_price, quantity, line_total";

const DELIVERY_COLUMNS: &str = "address_id, recipient_name, line1, line2, city, region, \
     postal_code, country, phone, instructions";

const PICKUP_COLUMNS: &str = "location, contact_name, phone, scheduled_for";

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of orders, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, query: &OrderListQuery) -> Result<OrderPage, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM storefront.order WHERE ($1::storefront.order_status IS NULL OR status = $1)",
        )
        .bind(query.status)
        .fetch_one(self.pool)
        .await?;

        let orders = sqlx::query_as::<_, OrderSummary>(&format!(
            r"
            {SUMMARY_SELECT}
            WHERE ($1::storefront.order_status IS NULL OR o.status = $1)
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(query.status)
        .bind(i64::from(query.limit()))
        .bind(query.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(OrderPage {
            orders,
            total,
            page: query.page(),
            limit: query.limit(),
        })
    }

    /// Get an order with its items and fulfillment details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let order = sqlx::query_as::<_, OrderSummary>(&format!("{SUMMARY_SELECT} WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match order {
            Some(order) => Ok(Some(load_detail(&mut conn, order).await?)),
            None => Ok(None),
        }
    }

    /// Current status of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn status(&self, id: OrderId) -> Result<OrderStatus, RepositoryError> {
        sqlx::query_scalar("SELECT status FROM storefront.order WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Move an order from `from` to `to`.
    ///
    /// Returns `None` when the order is no longer in `from`, so two editors
    /// racing on the same order cannot both win.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<OrderDetail>, RepositoryError> {
        let updated: Option<OrderId> = sqlx::query_scalar(
            r"
            UPDATE storefront.order
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING id
            ",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(self.pool)
        .await?;

        match updated {
            Some(id) => self.get(id).await,
            None => Ok(None),
        }
    }
}

async fn load_detail(
    conn: &mut PgConnection,
    order: OrderSummary,
) -> Result<OrderDetail, sqlx::Error> {
    let items = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM storefront.order_item WHERE order_id = $1 ORDER BY id"
    ))
    .bind(order.id)
    .fetch_all(&mut *conn)
    .await?;

    let delivery = sqlx::query_as::<_, Delivery>(&format!(
        "SELECT {DELIVERY_COLUMNS} FROM storefront.delivery WHERE order_id = $1"
    ))
    .bind(order.id)
    .fetch_optional(&mut *conn)
    .await?;

    let pickup = sqlx::query_as::<_, Pickup>(&format!(
        "SELECT {PICKUP_COLUMNS} FROM storefront.pickup WHERE order_id = $1"
    ))
    .bind(order.id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(OrderDetail {
        order,
        items,
        delivery,
        pickup,
    })
}
