//! Order repository.
//!
//! Orders are written once, in a single transaction that also empties the
//! user's cart, and never updated by the storefront afterwards.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use threadline_core::cart::CartLine;
use threadline_core::checkout::{PricedLine, Quote};
use threadline_core::{AddressId, CurrencyCode, FulfillmentMethod, OrderId, UserId};

use super::RepositoryError;
use super::carts::{load_lines, lock_cart, write_lines};
use crate::models::{AddressSnapshot, Delivery, Order, OrderDetail, OrderItem, Pickup};

const ORDER_COLUMNS: &str = "id, user_id, status, fulfillment_method, subtotal, shipping, total, \
     currency, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, product_id, variant_id, size, name, image_url, unit_price, quantity, line_total";

const DELIVERY_COLUMNS: &str = "address_id, recipient_name, line1, line2, city, region, \
     postal_code, country, phone, instructions";

const PICKUP_COLUMNS: &str = "location, contact_name, phone, scheduled_for";

/// How a new order will be fulfilled.
#[derive(Debug, Clone)]
pub enum NewFulfillment {
    Delivery {
        /// Saved address the snapshot was taken from, if any.
        address_id: Option<AddressId>,
        address: AddressSnapshot,
        instructions: Option<String>,
    },
    Pickup {
        location: String,
        contact_name: String,
        phone: String,
        scheduled_for: Option<DateTime<Utc>>,
    },
}

impl NewFulfillment {
    #[must_use]
    pub const fn method(&self) -> FulfillmentMethod {
        match self {
            Self::Delivery { .. } => FulfillmentMethod::Delivery,
            Self::Pickup { .. } => FulfillmentMethod::Pickup,
        }
    }
}

/// Everything needed to write an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub lines: Vec<PricedLine>,
    pub quote: Quote,
    pub currency: CurrencyCode,
    pub fulfillment: NewFulfillment,
}

/// Why [`OrderRepository::create`] wrote nothing.
#[derive(Debug, Error)]
pub enum CreateOrderError {
    /// The cart was emptied after it was priced, usually by an earlier submit.
    #[error("cart is empty")]
    EmptyCart,

    /// The cart no longer holds the lines the order was priced from.
    #[error("cart changed since it was priced")]
    CartChanged,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CreateOrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Write the order, its items and fulfillment row, and clear the cart.
    ///
    /// The cart row is locked first and its lines compared with the priced
    /// ones, so a cart can be ordered once and lines added after pricing are
    /// never dropped unseen.
    ///
    /// # Errors
    ///
    /// Returns `CreateOrderError::EmptyCart` or `CreateOrderError::CartChanged`
    /// if the cart no longer matches `new.lines`, and
    /// `CreateOrderError::Repository` if a quantity overflows the column or a
    /// statement fails. Nothing is written in any case.
    pub async fn create(&self, new: &NewOrder) -> Result<OrderDetail, CreateOrderError> {
        let mut tx = self.pool.begin().await?;

        let cart = lock_cart(&mut tx, new.user_id)
            .await?
            .ok_or(CreateOrderError::EmptyCart)?;
        let stored = load_lines(&mut tx, cart.id).await?;
        if stored.is_empty() {
            return Err(CreateOrderError::EmptyCart);
        }
        if !same_contents(&stored, &new.lines) {
            return Err(CreateOrderError::CartChanged);
        }

        let order = sqlx::query_as::<_, Order>(&format!(
            r"
            INSERT INTO storefront.order
                (user_id, fulfillment_method, subtotal, shipping, total, currency)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(new.user_id)
        .bind(new.fulfillment.method())
        .bind(new.quote.subtotal)
        .bind(new.quote.shipping)
        .bind(new.quote.total)
        .bind(new.currency.code())
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(new.lines.len());
        for priced in &new.lines {
            let line = &priced.line;
            let quantity = i32::try_from(line.quantity)
                .map_err(|_| RepositoryError::DataCorruption("quantity overflow".to_string()))?;

            let item = sqlx::query_as::<_, OrderItem>(&format!(
                r"
                INSERT INTO storefront.order_item
                    (order_id, product_id, variant_id, size, name, image_url,
                     unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING {ITEM_COLUMNS}
                "
            ))
            .bind(order.id)
            .bind(&line.product_id)
            .bind(&line.variant_id)
            .bind(&line.size)
            .bind(&line.name)
            .bind(&line.image_url)
            .bind(line.unit_price)
            .bind(quantity)
            .bind(priced.line_total)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);
        }

        let (delivery, pickup) = match &new.fulfillment {
            NewFulfillment::Delivery {
                address_id,
                address,
                instructions,
            } => {
                let delivery = sqlx::query_as::<_, Delivery>(&format!(
                    r"
                    INSERT INTO storefront.delivery
                        (order_id, address_id, recipient_name, line1, line2, city, region,
                         postal_code, country, phone, instructions)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                    RETURNING {DELIVERY_COLUMNS}
                    "
                ))
                .bind(order.id)
                .bind(address_id)
                .bind(&address.recipient_name)
                .bind(&address.line1)
                .bind(&address.line2)
                .bind(&address.city)
                .bind(&address.region)
                .bind(&address.postal_code)
                .bind(&address.country)
                .bind(&address.phone)
                .bind(instructions)
                .fetch_one(&mut *tx)
                .await?;
                (Some(delivery), None)
            }
            NewFulfillment::Pickup {
                location,
                contact_name,
                phone,
                scheduled_for,
            } => {
                let pickup = sqlx::query_as::<_, Pickup>(&format!(
                    r"
                    INSERT INTO storefront.pickup
                        (order_id, location, contact_name, phone, scheduled_for)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING {PICKUP_COLUMNS}
                    "
                ))
                .bind(order.id)
                .bind(location)
                .bind(contact_name)
                .bind(phone)
                .bind(scheduled_for)
                .fetch_one(&mut *tx)
                .await?;
                (None, Some(pickup))
            }
        };

        write_lines(&mut tx, cart.id, &[]).await?;
        tx.commit().await?;

        Ok(OrderDetail {
            order,
            items,
            delivery,
            pickup,
        })
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM storefront.order
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(orders)
    }

    /// Get an order with its details. Orders of other users are `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<OrderDetail>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        match order {
            Some(order) => Ok(Some(load_detail(&mut conn, order).await?)),
            None => Ok(None),
        }
    }
}

/// Same lines and quantities, in any order. Prices are not compared: the
/// priced lines carry current catalog prices, the stored ones the last sync.
fn same_contents(stored: &[CartLine], priced: &[PricedLine]) -> bool {
    let mut stored: Vec<_> = stored.iter().map(|l| (l.key(), l.quantity)).collect();
    let mut priced: Vec<_> = priced
        .iter()
        .map(|p| (p.line.key(), p.line.quantity))
        .collect();
    stored.sort_unstable();
    priced.sort_unstable();
    stored == priced
}

async fn load_detail(conn: &mut PgConnection, order: Order) -> Result<OrderDetail, sqlx::Error> {
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
