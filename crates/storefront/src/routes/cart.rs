//! Cart route handlers.
//!
//! The client owns the cart between syncs; `PUT` pushes its lines and gets
//! the reconciled, re-priced server cart back.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use threadline_core::cart::CartLine;

use crate::error::Result;
use crate::extract::ValidatedJson;
use crate::middleware::RequireUser;
use crate::models::CartView;
use crate::services::cart::CartService;
use crate::state::AppState;

/// Body of a cart push.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartSync {
    #[validate(length(max = 100), nested)]
    pub lines: Vec<CartLine>,
    /// `updatedAt` of the server cart the client last saw.
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
}

/// `GET /api/cart`
pub async fn get_cart(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool(), state.cms())
        .get(current.id)
        .await?;
    Ok(Json(cart))
}

/// `PUT /api/cart`
pub async fn sync_cart(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    ValidatedJson(body): ValidatedJson<CartSync>,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool(), state.cms())
        .sync(current.id, body.lines, body.synced_at)
        .await?;
    Ok(Json(cart))
}

/// `DELETE /api/cart`
pub async fn clear_cart(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<StatusCode> {
    CartService::new(state.pool(), state.cms())
        .clear(current.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use threadline_core::validation::FieldErrors;

    #[test]
    fn test_cart_sync_parses_camel_case() {
        let body: CartSync = serde_json::from_value(serde_json::json!({
            "lines": [{ "productId": "p1", "variantId": "v1", "quantity": 2 }],
            "syncedAt": "2026-01-02T03:04:05Z"
        }))
        .unwrap();
        assert_eq!(body.lines.len(), 1);
        assert!(body.synced_at.is_some());
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_cart_sync_validates_lines() {
        let body: CartSync = serde_json::from_value(serde_json::json!({
            "lines": [{ "productId": "", "variantId": "v1", "quantity": 2 }]
        }))
        .unwrap();
        let errors = FieldErrors::from(body.validate().unwrap_err());
        assert!(!errors.is_empty());
    }
}
