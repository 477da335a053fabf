//! Checkout: turn the server cart into an order.
//!
//! # Flow
//!
//! 1. Load the server cart (an empty cart is rejected)
//! 2. Fetch current prices from the CMS and re-price every line
//! 3. Quote shipping for the fulfillment method
//! 4. Compare the quote with the total the client displayed
//! 5. Snapshot the delivery address
//! 6. Write order, items, fulfillment and clear the cart in one transaction,
//!    after checking under the cart lock that the cart still holds the
//!    priced lines

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};
use validator::Validate;

use threadline_core::checkout::{
    PricingError, Quote, ShippingPolicy, TotalMismatch, price_lines, quote, verify_client_total,
};
use threadline_core::validation::FieldErrors;
use threadline_core::{AddressId, CurrencyCode, UserId};

use crate::cms::{CmsClient, CmsError};
use crate::db::{
    AddressRepository, CartRepository, CreateOrderError, NewFulfillment, NewOrder,
    OrderRepository, RepositoryError,
};
use crate::models::{AddressInput, AddressSnapshot, OrderDetail};

const MAX_INSTRUCTIONS_LENGTH: usize = 500;

/// Errors that stop an order from being placed.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    /// A line can't be bought at all.
    #[error(transparent)]
    Pricing(PricingError),

    /// Prices changed since the client rendered its total.
    #[error("{mismatch}")]
    TotalChanged { mismatch: TotalMismatch, quote: Quote },

    #[error("address not found")]
    AddressNotFound,

    /// The cart was changed from another tab or device while checking out.
    #[error("cart changed during checkout")]
    CartChanged,

    #[error(transparent)]
    Cms(#[from] CmsError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<PricingError> for CheckoutError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::EmptyCart => Self::EmptyCart,
            other => Self::Pricing(other),
        }
    }
}

impl From<CreateOrderError> for CheckoutError {
    fn from(err: CreateOrderError) -> Self {
        match err {
            CreateOrderError::EmptyCart => Self::EmptyCart,
            CreateOrderError::CartChanged => Self::CartChanged,
            CreateOrderError::Repository(e) => Self::Repository(e),
        }
    }
}

/// Fulfillment choice submitted with the order.
#[derive(Debug, Clone, Deserialize)]
#[serde(
    tag = "method",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum FulfillmentRequest {
    Delivery {
        /// A saved address to ship to.
        #[serde(default)]
        address_id: Option<AddressId>,
        /// A one-off address, used when `address_id` is absent.
        #[serde(default)]
        address: Option<AddressInput>,
        #[serde(default)]
        instructions: Option<String>,
    },
    Pickup {
        location: String,
        contact_name: String,
        phone: String,
        #[serde(default)]
        scheduled_for: Option<DateTime<Utc>>,
    },
}

impl FulfillmentRequest {
    /// Check the fields that the type system can't.
    ///
    /// Paths are relative to the request body (`fulfillment.address.city`).
    ///
    /// # Errors
    ///
    /// Returns every failed field.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        match self {
            Self::Delivery {
                address_id,
                address,
                instructions,
            } => {
                match (address_id, address) {
                    (None, None) => {
                        errors.add("fulfillment.addressId", "choose a saved address or enter one");
                    }
                    (None, Some(address)) => {
                        if let Err(e) = address.validate() {
                            for (field, messages) in FieldErrors::from(e).iter() {
                                for message in messages {
                                    errors.add(format!("fulfillment.address.{field}"), message);
                                }
                            }
                        }
                    }
                    (Some(_), _) => {}
                }
                if instructions
                    .as_ref()
                    .is_some_and(|i| i.chars().count() > MAX_INSTRUCTIONS_LENGTH)
                {
                    errors.add(
                        "fulfillment.instructions",
                        format!("must be at most {MAX_INSTRUCTIONS_LENGTH} characters"),
                    );
                }
            }
            Self::Pickup {
                location,
                contact_name,
                phone,
                ..
            } => {
                if location.trim().is_empty() {
                    errors.add("fulfillment.location", "is required");
                }
                if contact_name.trim().is_empty() {
                    errors.add("fulfillment.contactName", "is required");
                }
                let phone_len = phone.trim().chars().count();
                if !(5..=32).contains(&phone_len) {
                    errors.add("fulfillment.phone", "must be between 5 and 32 characters");
                }
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    cms: &'a CmsClient,
    policy: &'a ShippingPolicy,
    currency: CurrencyCode,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        cms: &'a CmsClient,
        policy: &'a ShippingPolicy,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            pool,
            cms,
            policy,
            currency,
        }
    }

    /// Place an order for the user's current cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart`, `CheckoutError::Pricing`,
    /// `CheckoutError::TotalChanged` or `CheckoutError::CartChanged` when the
    /// cart can't be bought as shown,
    /// `CheckoutError::AddressNotFound` for a foreign or deleted address, and
    /// `Cms`/`Repository` for downstream failures.
    #[instrument(skip(self, fulfillment), fields(%user_id, %client_total))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        fulfillment: FulfillmentRequest,
        client_total: Decimal,
    ) -> Result<OrderDetail, CheckoutError> {
        let cart = CartRepository::new(self.pool).get(user_id).await?;
        if cart.lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let product_ids: Vec<String> = cart.lines.iter().map(|l| l.product_id.clone()).collect();
        let book = self.cms.price_book(&product_ids).await?;

        let priced = price_lines(&cart.lines, &book)?;
        let fulfillment = self.resolve_fulfillment(user_id, fulfillment).await?;
        let quote = quote(&priced, fulfillment.method(), self.policy);

        verify_client_total(&quote, client_total)
            .map_err(|mismatch| CheckoutError::TotalChanged { mismatch, quote })?;

        let order = OrderRepository::new(self.pool)
            .create(&NewOrder {
                user_id,
                lines: priced,
                quote,
                currency: self.currency,
                fulfillment,
            })
            .await?;

        info!(
            order_id = %order.order.id,
            total = %order.order.total,
            method = ?order.order.fulfillment_method,
            "Order placed"
        );
        Ok(order)
    }

    async fn resolve_fulfillment(
        &self,
        user_id: UserId,
        request: FulfillmentRequest,
    ) -> Result<NewFulfillment, CheckoutError> {
        match request {
            FulfillmentRequest::Delivery {
                address_id: Some(address_id),
                instructions,
                ..
            } => {
                let address = AddressRepository::new(self.pool)
                    .get(user_id, address_id)
                    .await?
                    .ok_or(CheckoutError::AddressNotFound)?;
                Ok(NewFulfillment::Delivery {
                    address_id: Some(address_id),
                    address: AddressSnapshot::from(&address),
                    instructions: trimmed(instructions),
                })
            }
            FulfillmentRequest::Delivery {
                address: Some(address),
                instructions,
                ..
            } => Ok(NewFulfillment::Delivery {
                address_id: None,
                address: AddressSnapshot::from(address),
                instructions: trimmed(instructions),
            }),
            FulfillmentRequest::Delivery { .. } => Err(CheckoutError::AddressNotFound),
            FulfillmentRequest::Pickup {
                location,
                contact_name,
                phone,
                scheduled_for,
            } => Ok(NewFulfillment::Pickup {
                location: location.trim().to_string(),
                contact_name: contact_name.trim().to_string(),
                phone: phone.trim().to_string(),
                scheduled_for,
            }),
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(value: serde_json::Value) -> FulfillmentRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_delivery_with_saved_address() {
        let request = parse(serde_json::json!({
            "method": "delivery",
            "addressId": 7,
            "instructions": "Leave with the concierge"
        }));
        assert!(matches!(
            request,
            FulfillmentRequest::Delivery { address_id: Some(id), .. } if id.as_i32() == 7
        ));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_delivery_requires_an_address() {
        let errors = parse(serde_json::json!({ "method": "delivery" }))
            .validate()
            .unwrap_err();
        assert!(errors.get("fulfillment.addressId").is_some());
    }

    #[test]
    fn test_inline_address_errors_are_prefixed() {
        let errors = parse(serde_json::json!({
            "method": "delivery",
            "address": {
                "recipientName": "Ada",
                "line1": "",
                "city": "London",
                "postalCode": "N1",
                "country": "GB"
            }
        }))
        .validate()
        .unwrap_err();
        assert!(errors.get("fulfillment.address.line1").is_some());
    }

    #[test]
    fn test_pickup_fields_checked() {
        let errors = parse(serde_json::json!({
            "method": "pickup",
            "location": "Main St",
            "contactName": " ",
            "phone": "12"
        }))
        .validate()
        .unwrap_err();
        assert!(errors.get("fulfillment.contactName").is_some());
        assert!(errors.get("fulfillment.phone").is_some());
        assert!(errors.get("fulfillment.location").is_none());
    }

    #[test]
    fn test_unknown_method_rejected() {
        let result: Result<FulfillmentRequest, _> =
            serde_json::from_value(serde_json::json!({ "method": "drone" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_cart_pricing_error_maps_to_empty_cart() {
        assert!(matches!(
            CheckoutError::from(PricingError::EmptyCart),
            CheckoutError::EmptyCart
        ));
    }
}
