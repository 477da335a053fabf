//! Order route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use threadline_core::OrderId;

use crate::db::OrderRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::extract::JsonBody;
use crate::middleware::RequireUser;
use crate::models::{Order, OrderDetail};
use crate::services::checkout::{CheckoutService, FulfillmentRequest};
use crate::state::AppState;

/// Body of `POST /api/orders`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub fulfillment: FulfillmentRequest,
    /// Total shown to the customer, compared against the server quote.
    pub client_total: Decimal,
}

/// Place an order for the current cart.
///
/// # Route
///
/// `POST /api/orders`
///
/// # Errors
///
/// 400 for an empty cart, 409 if a line can't be bought or prices moved,
/// 422 for invalid fulfillment details.
#[instrument(skip(state, request), fields(user_id = %current.id))]
pub async fn place_order(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    JsonBody(request): JsonBody<PlaceOrderRequest>,
) -> Result<impl IntoResponse> {
    request.fulfillment.validate()?;

    let config = state.config();
    let order = CheckoutService::new(state.pool(), state.cms(), &config.shipping, config.currency)
        .place_order(current.id, request.fulfillment, request.client_total)
        .await?;

    add_breadcrumb("checkout", "Order placed", None);
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /api/orders`
pub async fn list_orders(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(current.id)
        .await?;
    Ok(Json(orders))
}

/// `GET /api/orders/{id}`
///
/// Other users' orders are reported as missing.
pub async fn get_order(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    OrderRepository::new(state.pool())
        .get_for_user(current.id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_place_order_request_parses() {
        let request: PlaceOrderRequest = serde_json::from_value(serde_json::json!({
            "fulfillment": {
                "method": "pickup",
                "location": "Main St",
                "contactName": "Ada",
                "phone": "555-0100"
            },
            "clientTotal": "104.50"
        }))
        .unwrap();
        assert_eq!(request.client_total, Decimal::new(10450, 2));
        assert!(matches!(request.fulfillment, FulfillmentRequest::Pickup { .. }));
    }

    #[test]
    fn test_place_order_request_requires_total() {
        let result: std::result::Result<PlaceOrderRequest, _> =
            serde_json::from_value(serde_json::json!({
                "fulfillment": { "method": "delivery", "addressId": 1 }
            }));
        assert!(result.is_err());
    }
}
