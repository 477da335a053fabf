//! Server cart synchronization.
//!
//! The browser keeps the cart locally and pushes it whenever it changes. On
//! each push the local lines are reconciled with the server copy, re-priced
//! from the CMS, and stored. The stored cart's `updated_at` goes back to the
//! client as the `syncedAt` for its next push.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};

use threadline_core::UserId;
use threadline_core::cart::{CartLine, reconcile};
use threadline_core::cms::Product;

use crate::cms::{CmsClient, CmsError};
use crate::db::{CartRepository, RepositoryError};
use crate::models::CartView;

/// Errors from cart operations.
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error(transparent)]
    Cms(#[from] CmsError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct CartService<'a> {
    carts: CartRepository<'a>,
    cms: &'a CmsClient,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, cms: &'a CmsClient) -> Self {
        Self {
            carts: CartRepository::new(pool),
            cms,
        }
    }

    /// The user's server cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the cart can't be loaded.
    pub async fn get(&self, user_id: UserId) -> Result<CartView, CartError> {
        Ok(self.carts.get(user_id).await?)
    }

    /// Merge the client's cart into the server cart and store the result.
    ///
    /// The server cart stays locked from the read to the write, so two
    /// devices pushing at once are merged one after the other.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Cms` if current prices can't be fetched, or
    /// `CartError::Repository` if the cart can't be stored.
    #[instrument(skip(self, local), fields(local_lines = local.len()))]
    pub async fn sync(
        &self,
        user_id: UserId,
        local: Vec<CartLine>,
        synced_at: Option<DateTime<Utc>>,
    ) -> Result<CartView, CartError> {
        let cms = self.cms;
        self.carts
            .update(user_id, |server| async move {
                let merged = reconcile(local, synced_at, server.lines, server.updated_at);

                let product_ids: Vec<String> =
                    merged.iter().map(|l| l.product_id.clone()).collect();
                let products = cms.products_by_ids(&product_ids).await?;
                let lines = reprice(merged, &products);

                debug!(lines = lines.len(), "Storing reconciled cart");
                Ok::<_, CartError>(lines)
            })
            .await
    }

    /// Empty the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), CartError> {
        Ok(self.carts.clear(user_id).await?)
    }
}

/// Refresh price, name and image of each line from the catalog.
///
/// Lines whose product or variant no longer exists are dropped. Unavailable
/// variants stay in the cart; checkout rejects them with a reason.
fn reprice(lines: Vec<CartLine>, products: &[Product]) -> Vec<CartLine> {
    let by_id: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();

    lines
        .into_iter()
        .filter_map(|line| {
            let product = by_id.get(line.product_id.as_str())?;
            let variant = product.variant(&line.variant_id)?;

            let name = if variant.name.is_empty() || product.variants.len() == 1 {
                product.name.clone()
            } else {
                format!("{} - {}", product.name, variant.name)
            };
            let image_url = product
                .image_for(&variant.key)
                .map(|m| m.url.clone())
                .or(line.image_url);

            Some(CartLine {
                name,
                image_url,
                unit_price: variant.price,
                ..line
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn product() -> Product {
        serde_json::from_value(serde_json::json!({
            "_id": "p1",
            "name": "Linen Shirt",
            "slug": { "current": "linen-shirt" },
            "category": { "_id": "c1" },
            "subcategory": { "_id": "s1" },
            "variants": [
                { "_key": "sand", "name": "Sand", "price": "49.00",
                  "images": [{ "url": "https://cdn.test/sand.jpg" }] },
                { "_key": "navy", "name": "Navy", "price": "52.50" }
            ],
            "media": [{ "url": "https://cdn.test/shirt.jpg" }]
        }))
        .unwrap()
    }

    fn line(product: &str, variant: &str, price: &str) -> CartLine {
        CartLine {
            product_id: product.to_string(),
            variant_id: variant.to_string(),
            size: Some("M".to_string()),
            name: "stale".to_string(),
            image_url: None,
            unit_price: price.parse().unwrap(),
            quantity: 2,
        }
    }

    #[test]
    fn test_reprice_uses_catalog_price() {
        let lines = reprice(vec![line("p1", "navy", "0.01")], &[product()]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].unit_price, Decimal::new(5250, 2));
        assert_eq!(lines[0].name, "Linen Shirt - Navy");
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[0].size.as_deref(), Some("M"));
    }

    #[test]
    fn test_reprice_prefers_variant_image() {
        let lines = reprice(
            vec![line("p1", "sand", "49.00"), line("p1", "navy", "52.50")],
            &[product()],
        );
        assert_eq!(lines[0].image_url.as_deref(), Some("https://cdn.test/sand.jpg"));
        assert_eq!(lines[1].image_url.as_deref(), Some("https://cdn.test/shirt.jpg"));
    }

    #[test]
    fn test_reprice_drops_vanished_products_and_variants() {
        let lines = reprice(
            vec![
                line("gone", "sand", "10.00"),
                line("p1", "olive", "10.00"),
                line("p1", "sand", "10.00"),
            ],
            &[product()],
        );
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].variant_id, "sand");
    }
}
