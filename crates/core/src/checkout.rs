//! Server-side price recomputation for checkout.
//!
//! Prices submitted by the client are never trusted. At checkout every cart
//! line is re-priced from the catalog, a shipping charge is added according
//! to the fulfillment method, and the resulting total must agree with what
//! the client displayed to within [`ROUNDING_TOLERANCE`](crate::types::ROUNDING_TOLERANCE).

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::types::{FulfillmentMethod, approx_eq, round_amount};

/// Current catalog price and availability of one product variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPrice {
    pub unit_price: Decimal,
    pub available: bool,
    /// `None` when stock is not tracked for the variant.
    pub stock: Option<u32>,
}

/// Catalog prices keyed by `(product_id, variant_id)`.
pub type PriceBook = HashMap<(String, String), CatalogPrice>;

/// A cart line priced against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    #[serde(flatten)]
    pub line: CartLine,
    pub line_total: Decimal,
}

/// Why a cart could not be priced.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("product {product_id} variant {variant_id} no longer exists")]
    Missing {
        product_id: String,
        variant_id: String,
    },

    #[error("{name} is no longer available")]
    Unavailable { product_id: String, name: String },

    #[error("only {available} of {name} left in stock")]
    InsufficientStock {
        product_id: String,
        name: String,
        requested: u32,
        available: u32,
    },
}

/// Shipping charges applied by [`quote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingPolicy {
    pub delivery_fee: Decimal,
    /// Delivery is free when the subtotal is at or above this amount.
    pub free_delivery_threshold: Option<Decimal>,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            delivery_fee: Decimal::new(1000, 2),
            free_delivery_threshold: Some(Decimal::new(15000, 2)),
        }
    }
}

impl ShippingPolicy {
    /// Shipping charge for a given subtotal and method.
    #[must_use]
    pub fn shipping_for(&self, subtotal: Decimal, method: FulfillmentMethod) -> Decimal {
        match method {
            FulfillmentMethod::Pickup => Decimal::ZERO,
            FulfillmentMethod::Delivery => match self.free_delivery_threshold {
                Some(threshold) if subtotal >= threshold => Decimal::ZERO,
                _ => self.delivery_fee,
            },
        }
    }
}

/// Server-computed order totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Client total disagrees with the server quote.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("order total changed: expected {expected}, got {submitted}")]
pub struct TotalMismatch {
    pub expected: Decimal,
    pub submitted: Decimal,
}

/// Re-price every line from the catalog.
///
/// The unit price on each returned line is the catalog price; whatever the
/// client sent is discarded.
///
/// # Errors
///
/// Returns the first line that is missing from the catalog, unavailable, or
/// requests more than the tracked stock. An empty cart is an error.
pub fn price_lines(lines: &[CartLine], catalog: &PriceBook) -> Result<Vec<PricedLine>, PricingError> {
    if lines.is_empty() {
        return Err(PricingError::EmptyCart);
    }

    lines
        .iter()
        .map(|line| {
            let key = (line.product_id.clone(), line.variant_id.clone());
            let Some(price) = catalog.get(&key) else {
                return Err(PricingError::Missing {
                    product_id: line.product_id.clone(),
                    variant_id: line.variant_id.clone(),
                });
            };

            if !price.available {
                return Err(PricingError::Unavailable {
                    product_id: line.product_id.clone(),
                    name: line.name.clone(),
                });
            }

            if let Some(stock) = price.stock
                && line.quantity > stock
            {
                return Err(PricingError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    name: line.name.clone(),
                    requested: line.quantity,
                    available: stock,
                });
            }

            let priced = CartLine {
                unit_price: price.unit_price,
                ..line.clone()
            };
            let line_total = round_amount(priced.line_total());
            Ok(PricedLine {
                line: priced,
                line_total,
            })
        })
        .collect()
}

/// Sum priced lines and add shipping.
#[must_use]
pub fn quote(priced: &[PricedLine], method: FulfillmentMethod, policy: &ShippingPolicy) -> Quote {
    let subtotal = round_amount(priced.iter().map(|p| p.line_total).sum());
    let shipping = round_amount(policy.shipping_for(subtotal, method));
    Quote {
        subtotal,
        shipping,
        total: subtotal + shipping,
    }
}

/// Check the client's displayed total against the server quote.
///
/// # Errors
///
/// Returns [`TotalMismatch`] when the two differ by more than
/// [`ROUNDING_TOLERANCE`](crate::types::ROUNDING_TOLERANCE).
pub fn verify_client_total(quote: &Quote, client_total: Decimal) -> Result<(), TotalMismatch> {
    if approx_eq(quote.total, client_total) {
        Ok(())
    } else {
        Err(TotalMismatch {
            expected: quote.total,
            submitted: client_total,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(product: &str, qty: u32, client_price: &str) -> CartLine {
        CartLine {
            product_id: product.to_string(),
            variant_id: "v1".to_string(),
            size: None,
            name: product.to_uppercase(),
            image_url: None,
            unit_price: dec(client_price),
            quantity: qty,
        }
    }

    fn book(entries: &[(&str, &str, bool, Option<u32>)]) -> PriceBook {
        entries
            .iter()
            .map(|(product, price, available, stock)| {
                (
                    ((*product).to_string(), "v1".to_string()),
                    CatalogPrice {
                        unit_price: dec(price),
                        available: *available,
                        stock: *stock,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_price_lines_uses_catalog_price() {
        let catalog = book(&[("tee", "25.00", true, None)]);
        let priced = price_lines(&[line("tee", 2, "0.01")], &catalog).unwrap();
        assert_eq!(priced[0].line.unit_price, dec("25.00"));
        assert_eq!(priced[0].line_total, dec("50.00"));
    }

    #[test]
    fn test_price_lines_errors() {
        let catalog = book(&[("tee", "25.00", false, None), ("cap", "10.00", true, Some(1))]);

        assert_eq!(price_lines(&[], &catalog), Err(PricingError::EmptyCart));
        assert!(matches!(
            price_lines(&[line("gone", 1, "1")], &catalog),
            Err(PricingError::Missing { .. })
        ));
        assert!(matches!(
            price_lines(&[line("tee", 1, "1")], &catalog),
            Err(PricingError::Unavailable { .. })
        ));
        assert!(matches!(
            price_lines(&[line("cap", 2, "1")], &catalog),
            Err(PricingError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_quote_delivery_fee_and_threshold() {
        let policy = ShippingPolicy::default();
        let catalog = book(&[("tee", "25.00", true, None)]);

        let small = price_lines(&[line("tee", 2, "0")], &catalog).unwrap();
        let q = quote(&small, FulfillmentMethod::Delivery, &policy);
        assert_eq!(q.shipping, dec("10.00"));
        assert_eq!(q.total, dec("60.00"));

        let large = price_lines(&[line("tee", 6, "0")], &catalog).unwrap();
        let q = quote(&large, FulfillmentMethod::Delivery, &policy);
        assert_eq!(q.shipping, Decimal::ZERO);
        assert_eq!(q.total, dec("150.00"));
    }

    #[test]
    fn test_quote_pickup_is_free() {
        let catalog = book(&[("tee", "25.00", true, None)]);
        let priced = price_lines(&[line("tee", 1, "0")], &catalog).unwrap();
        let q = quote(&priced, FulfillmentMethod::Pickup, &ShippingPolicy::default());
        assert_eq!(q.shipping, Decimal::ZERO);
        assert_eq!(q.total, dec("25.00"));
    }

    #[test]
    fn test_verify_client_total_tolerance() {
        let q = Quote {
            subtotal: dec("49.99"),
            shipping: dec("10.00"),
            total: dec("59.99"),
        };
        assert!(verify_client_total(&q, dec("59.99")).is_ok());
        assert!(verify_client_total(&q, dec("60.00")).is_ok());
        assert!(verify_client_total(&q, dec("59.98")).is_ok());

        let err = verify_client_total(&q, dec("60.01")).unwrap_err();
        assert_eq!(err.expected, dec("59.99"));
        assert_eq!(err.submitted, dec("60.01"));
    }
}
