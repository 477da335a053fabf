//! Public catalog route handlers.
//!
//! Everything here is read from the CMS through the client's cache and is
//! safe for shared caches to keep for a short while.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use threadline_core::cms::{Banner, Category, Color, GridItem, Product, Size, Subcategory};

use crate::error::Result;
use crate::state::AppState;

const PUBLIC_CACHE_CONTROL: &str = "public, max-age=60, stale-while-revalidate=300";

/// Homepage content.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeContent {
    pub banners: Vec<Banner>,
    pub grid_items: Vec<GridItem>,
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    pub subcategories: Vec<Subcategory>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryProducts {
    pub subcategory: Subcategory,
    pub products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
pub struct ProductsQuery {
    #[serde(default)]
    pub featured: bool,
}

/// `GET /api/catalog/home`
pub async fn home(State(state): State<AppState>) -> Result<Response> {
    let cms = state.cms();
    let (mut banners, mut grid_items, categories) =
        tokio::try_join!(cms.banners(), cms.grid_items(), cms.categories())?;

    banners.retain(|b| b.active);
    banners.sort_by_key(|b| b.sort_order);
    grid_items.sort_by_key(|g| g.sort_order);

    Ok(cacheable(HomeContent {
        banners,
        grid_items,
        categories,
    }))
}

/// `GET /api/catalog/categories`
pub async fn categories(State(state): State<AppState>) -> Result<Response> {
    Ok(cacheable(state.cms().categories().await?))
}

/// `GET /api/catalog/categories/{slug}`
pub async fn category(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Response> {
    let category = state.cms().category_by_slug(&slug).await?;
    let subcategories = state.cms().subcategories_for_category(&category.id).await?;

    Ok(cacheable(CategoryDetail {
        category,
        subcategories,
    }))
}

/// `GET /api/catalog/subcategories/{slug}/products`
pub async fn subcategory_products(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response> {
    let subcategory = state.cms().subcategory_by_slug(&slug).await?;
    let products = state.cms().products_for_subcategory(&subcategory.id).await?;

    Ok(cacheable(SubcategoryProducts {
        subcategory,
        products,
    }))
}

/// `GET /api/catalog/products?featured=true`
pub async fn products(
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> Result<Response> {
    Ok(cacheable(state.cms().products(query.featured).await?))
}

/// `GET /api/catalog/products/{slug}`
pub async fn product(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Response> {
    Ok(cacheable(state.cms().product_by_slug(&slug).await?))
}

/// `GET /api/catalog/colors`
pub async fn colors(State(state): State<AppState>) -> Result<Response> {
    let colors: Vec<Color> = state.cms().colors().await?;
    Ok(cacheable(colors))
}

/// `GET /api/catalog/sizes`
pub async fn sizes(State(state): State<AppState>) -> Result<Response> {
    let mut sizes: Vec<Size> = state.cms().sizes().await?;
    sizes.sort_by_key(|s| s.sort_order);
    Ok(cacheable(sizes))
}

fn cacheable(body: impl Serialize) -> Response {
    (
        [(
            header::CACHE_CONTROL,
            HeaderValue::from_static(PUBLIC_CACHE_CONTROL),
        )],
        Json(body),
    )
        .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cacheable_sets_public_cache_control() {
        let response = cacheable(Vec::<Color>::new());
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            PUBLIC_CACHE_CONTROL
        );
    }

    #[test]
    fn test_category_detail_flattens_category() {
        let category: Category = serde_json::from_value(serde_json::json!({
            "_id": "c1",
            "name": "Shirts",
            "slug": { "current": "shirts" }
        }))
        .unwrap();
        let value = serde_json::to_value(CategoryDetail {
            category,
            subcategories: Vec::new(),
        })
        .unwrap();
        assert_eq!(value["_id"], "c1");
        assert_eq!(value["subcategories"], serde_json::json!([]));
    }
}
