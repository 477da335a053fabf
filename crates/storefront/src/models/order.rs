//! Order types. Orders are immutable snapshots once created.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use threadline_core::{AddressId, FulfillmentMethod, OrderId, OrderItemId, OrderStatus, UserId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(skip)]
    pub user_id: UserId,
    pub status: OrderStatus,
    pub fulfillment_method: FulfillmentMethod,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: String,
    pub variant_id: String,
    pub size: Option<String>,
    pub name: String,
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub address_id: Option<AddressId>,
    pub recipient_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Pickup {
    pub location: String,
    pub contact_name: String,
    pub phone: String,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// An order with its items and fulfillment details.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Delivery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup: Option<Pickup>,
}
