//! Order rows as the back-office sees them: with the customer attached.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use threadline_core::{AddressId, FulfillmentMethod, OrderId, OrderItemId, OrderStatus, UserId};

/// Default page size for order lists.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size for order lists.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: OrderId,
    pub user_id: UserId,
    pub customer_email: String,
    pub customer_name: String,
    pub status: OrderStatus,
    pub fulfillment_method: FulfillmentMethod,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub item_count: i64,
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

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderSummary,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Delivery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup: Option<Pickup>,
}

/// Filter and paging for order lists.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[validate(range(min = 1))]
    #[serde(default)]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    #[serde(default)]
    pub limit: Option<u32>,
}

impl OrderListQuery {
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.limit())
    }
}

/// One page of orders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub orders: Vec<OrderSummary>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults() {
        let query: OrderListQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn test_list_query_paging() {
        let query: OrderListQuery =
            serde_json::from_str(r#"{"status":"shipped","page":3,"limit":50}"#).unwrap();
        assert_eq!(query.status, Some(OrderStatus::Shipped));
        assert_eq!(query.offset(), 100);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_list_query_rejects_large_limit() {
        let query: OrderListQuery = serde_json::from_str(r#"{"limit":500}"#).unwrap();
        assert!(query.validate().is_err());
    }
}
