//! Server-side cart types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use threadline_core::cart::{CartLine, CartTotals, totals};
use threadline_core::{CartId, UserId};

/// A cart row. Each user has at most one.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A `storefront.cart_item` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartItemRow {
    pub product_id: String,
    pub variant_id: String,
    pub size: Option<String>,
    pub name: String,
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl From<CartItemRow> for CartLine {
    fn from(row: CartItemRow) -> Self {
        Self {
            product_id: row.product_id,
            variant_id: row.variant_id,
            size: row.size,
            name: row.name,
            image_url: row.image_url,
            unit_price: row.unit_price,
            quantity: u32::try_from(row.quantity).unwrap_or(0),
        }
    }
}

/// Canonical cart returned to the client.
///
/// `updated_at` is what the client sends back as `syncedAt` on its next push.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CartView {
    #[must_use]
    pub fn new(lines: Vec<CartLine>, updated_at: Option<DateTime<Utc>>) -> Self {
        let totals = totals(&lines);
        Self {
            lines,
            totals,
            updated_at,
        }
    }

    /// An empty cart with no server row.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new(), None)
    }
}
