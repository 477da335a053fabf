//! CMS GraphQL client with a read-through cache.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use graphql_client::{GraphQLQuery, Response};
use moka::future::Cache;
use secrecy::ExposeSecret;
use tracing::{debug, instrument};

use threadline_core::checkout::PriceBook;
use threadline_core::cms::{Banner, Category, Color, GridItem, Product, Size, Subcategory};

use super::cache::CacheValue;
use super::queries::{
    ActiveBanners, AllCategories, AllColors, AllProducts, AllSizes, CategoryBySlug,
    FeaturedProducts, GridItems, IdVariables, IdsVariables, Items, NoVariables, ProductBySlug,
    ProductsByIds, ProductsBySubcategory, SlugVariables, SubcategoriesByCategory,
    SubcategoryBySlug,
};
use super::{CmsError, GraphQLError};
use crate::config::CmsConfig;

/// Client for the CMS GraphQL API.
///
/// Catalog reads are cached for 5 minutes. Price lookups for carts and
/// checkout always go to the CMS.
#[derive(Clone)]
pub struct CmsClient {
    inner: Arc<CmsClientInner>,
}

struct CmsClientInner {
    client: reqwest::Client,
    endpoint: String,
    read_token: Option<String>,
    cache: Cache<String, CacheValue>,
}

impl CmsClient {
    /// Create a new CMS client.
    #[must_use]
    pub fn new(config: &CmsConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(CmsClientInner {
                client: reqwest::Client::new(),
                endpoint: config.graphql_endpoint(),
                read_token: config
                    .read_token
                    .as_ref()
                    .map(|t| t.expose_secret().to_string()),
                cache,
            }),
        }
    }

    /// Execute a GraphQL query.
    async fn execute<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, CmsError> {
        let request_body = Q::build_query(variables);

        let mut request = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .header("Content-Type", "application/json")
            .json(&request_body);
        if let Some(token) = &self.inner.read_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(CmsError::RateLimited(retry_after));
        }

        // Read as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                operation = request_body.operation_name,
                body = %response_text.chars().take(500).collect::<String>(),
                "CMS returned non-success status"
            );
            return Err(CmsError::GraphQL(vec![GraphQLError {
                message: format!(
                    "HTTP {status}: {}",
                    response_text.chars().take(200).collect::<String>()
                ),
                path: vec![],
            }]));
        }

        let response: Response<Q::ResponseData> = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    operation = request_body.operation_name,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse CMS GraphQL response"
                );
                return Err(CmsError::Parse(e));
            }
        };

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            debug!(errors = ?errors, "GraphQL errors in response");
            return Err(CmsError::GraphQL(
                errors.into_iter().map(GraphQLError::from).collect(),
            ));
        }

        response.data.ok_or_else(|| {
            tracing::error!(
                operation = request_body.operation_name,
                "CMS GraphQL response has no data and no errors"
            );
            CmsError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
                path: vec![],
            }])
        })
    }

    /// Serve `key` from the cache, or run `fetch` and cache its result.
    async fn cached<T, F>(
        &self,
        key: String,
        unwrap: fn(CacheValue) -> Option<Vec<T>>,
        wrap: fn(Vec<T>) -> CacheValue,
        fetch: F,
    ) -> Result<Vec<T>, CmsError>
    where
        T: Clone,
        F: Future<Output = Result<Vec<T>, CmsError>>,
    {
        if let Some(items) = self.inner.cache.get(&key).await.and_then(unwrap) {
            debug!(key = %key, "CMS cache hit");
            return Ok(items);
        }

        let items = fetch.await?;
        self.inner.cache.insert(key, wrap(items.clone())).await;
        Ok(items)
    }

    /// Drop every cached response.
    pub fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// All categories, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns an error if the CMS request fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<Category>, CmsError> {
        self.cached(
            "categories".to_string(),
            as_categories,
            CacheValue::Categories,
            async {
                Ok(self
                    .execute::<AllCategories>(NoVariables {})
                    .await?
                    .items)
            },
        )
        .await
    }

    /// Get a category by its slug.
    ///
    /// # Errors
    ///
    /// Returns `CmsError::NotFound` if no category has this slug.
    #[instrument(skip(self))]
    pub async fn category_by_slug(&self, slug: &str) -> Result<Category, CmsError> {
        let items = self
            .cached(
                format!("category:{slug}"),
                as_categories,
                CacheValue::Categories,
                async {
                    let variables = SlugVariables {
                        slug: slug.to_string(),
                    };
                    Ok(self.execute::<CategoryBySlug>(variables).await?.items)
                },
            )
            .await?;

        first_or_not_found(items, || format!("Category not found: {slug}"))
    }

    /// Subcategories belonging to a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the CMS request fails.
    #[instrument(skip(self))]
    pub async fn subcategories_for_category(
        &self,
        category_id: &str,
    ) -> Result<Vec<Subcategory>, CmsError> {
        self.cached(
            format!("subcategories:{category_id}"),
            as_subcategories,
            CacheValue::Subcategories,
            async {
                let variables = IdVariables {
                    id: category_id.to_string(),
                };
                Ok(self
                    .execute::<SubcategoriesByCategory>(variables)
                    .await?
                    .items)
            },
        )
        .await
    }

    /// Get a subcategory by its slug.
    ///
    /// # Errors
    ///
    /// Returns `CmsError::NotFound` if no subcategory has this slug.
    #[instrument(skip(self))]
    pub async fn subcategory_by_slug(&self, slug: &str) -> Result<Subcategory, CmsError> {
        let items = self
            .cached(
                format!("subcategory:{slug}"),
                as_subcategories,
                CacheValue::Subcategories,
                async {
                    let variables = SlugVariables {
                        slug: slug.to_string(),
                    };
                    Ok(self.execute::<SubcategoryBySlug>(variables).await?.items)
                },
            )
            .await?;

        first_or_not_found(items, || format!("Subcategory not found: {slug}"))
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Products in a subcategory.
    ///
    /// # Errors
    ///
    /// Returns an error if the CMS request fails.
    #[instrument(skip(self))]
    pub async fn products_for_subcategory(
        &self,
        subcategory_id: &str,
    ) -> Result<Vec<Product>, CmsError> {
        self.cached(
            format!("products:subcategory:{subcategory_id}"),
            as_products,
            CacheValue::Products,
            async {
                let variables = IdVariables {
                    id: subcategory_id.to_string(),
                };
                Ok(self.execute::<ProductsBySubcategory>(variables).await?.items)
            },
        )
        .await
    }

    /// All products, or only featured ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the CMS request fails.
    #[instrument(skip(self))]
    pub async fn products(&self, featured_only: bool) -> Result<Vec<Product>, CmsError> {
        let key = if featured_only {
            "products:featured"
        } else {
            "products:all"
        };

        self.cached(key.to_string(), as_products, CacheValue::Products, async {
            let items = if featured_only {
                self.execute::<FeaturedProducts>(NoVariables {}).await?.items
            } else {
                self.execute::<AllProducts>(NoVariables {}).await?.items
            };
            Ok(items)
        })
        .await
    }

    /// Get a product by its slug.
    ///
    /// # Errors
    ///
    /// Returns `CmsError::NotFound` if no product has this slug.
    #[instrument(skip(self))]
    pub async fn product_by_slug(&self, slug: &str) -> Result<Product, CmsError> {
        let items = self
            .cached(
                format!("product:{slug}"),
                as_products,
                CacheValue::Products,
                async {
                    let variables = SlugVariables {
                        slug: slug.to_string(),
                    };
                    Ok(self.execute::<ProductBySlug>(variables).await?.items)
                },
            )
            .await?;

        first_or_not_found(items, || format!("Product not found: {slug}"))
    }

    /// Current prices for the given products, bypassing the cache.
    ///
    /// Products the CMS no longer has are simply absent from the book.
    ///
    /// # Errors
    ///
    /// Returns an error if the CMS request fails.
    #[instrument(skip(self), fields(count = product_ids.len()))]
    pub async fn price_book(&self, product_ids: &[String]) -> Result<PriceBook, CmsError> {
        let mut book = PriceBook::new();
        if product_ids.is_empty() {
            return Ok(book);
        }

        let mut ids = product_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let data: Items<Product> = self.execute::<ProductsByIds>(IdsVariables { ids }).await?;
        for product in &data.items {
            product.extend_price_book(&mut book);
        }
        Ok(book)
    }

    /// Products by id, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the CMS request fails.
    #[instrument(skip(self), fields(count = product_ids.len()))]
    pub async fn products_by_ids(&self, product_ids: &[String]) -> Result<Vec<Product>, CmsError> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        let variables = IdsVariables {
            ids: product_ids.to_vec(),
        };
        Ok(self.execute::<ProductsByIds>(variables).await?.items)
    }

    // =========================================================================
    // Homepage & options
    // =========================================================================

    /// Active banners in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the CMS request fails.
    #[instrument(skip(self))]
    pub async fn banners(&self) -> Result<Vec<Banner>, CmsError> {
        self.cached(
            "banners".to_string(),
            |v| match v {
                CacheValue::Banners(items) => Some(items),
                _ => None,
            },
            CacheValue::Banners,
            async { Ok(self.execute::<ActiveBanners>(NoVariables {}).await?.items) },
        )
        .await
    }

    /// Homepage grid items in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the CMS request fails.
    #[instrument(skip(self))]
    pub async fn grid_items(&self) -> Result<Vec<GridItem>, CmsError> {
        self.cached(
            "grid_items".to_string(),
            |v| match v {
                CacheValue::GridItems(items) => Some(items),
                _ => None,
            },
            CacheValue::GridItems,
            async { Ok(self.execute::<GridItems>(NoVariables {}).await?.items) },
        )
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the CMS request fails.
    #[instrument(skip(self))]
    pub async fn colors(&self) -> Result<Vec<Color>, CmsError> {
        self.cached(
            "colors".to_string(),
            |v| match v {
                CacheValue::Colors(items) => Some(items),
                _ => None,
            },
            CacheValue::Colors,
            async { Ok(self.execute::<AllColors>(NoVariables {}).await?.items) },
        )
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the CMS request fails.
    #[instrument(skip(self))]
    pub async fn sizes(&self) -> Result<Vec<Size>, CmsError> {
        self.cached(
            "sizes".to_string(),
            |v| match v {
                CacheValue::Sizes(items) => Some(items),
                _ => None,
            },
            CacheValue::Sizes,
            async { Ok(self.execute::<AllSizes>(NoVariables {}).await?.items) },
        )
        .await
    }
}

fn as_categories(value: CacheValue) -> Option<Vec<Category>> {
    match value {
        CacheValue::Categories(items) => Some(items),
        _ => None,
    }
}

fn as_subcategories(value: CacheValue) -> Option<Vec<Subcategory>> {
    match value {
        CacheValue::Subcategories(items) => Some(items),
        _ => None,
    }
}

fn as_products(value: CacheValue) -> Option<Vec<Product>> {
    match value {
        CacheValue::Products(items) => Some(items),
        _ => None,
    }
}

fn first_or_not_found<T>(items: Vec<T>, what: impl FnOnce() -> String) -> Result<T, CmsError> {
    items
        .into_iter()
        .next()
        .ok_or_else(|| CmsError::NotFound(what()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_value_unwrap_rejects_other_variants() {
        assert!(as_products(CacheValue::Colors(vec![])).is_none());
        assert_eq!(as_categories(CacheValue::Categories(vec![])), Some(vec![]));
    }

    #[test]
    fn test_first_or_not_found() {
        assert_eq!(first_or_not_found(vec![1, 2], String::new).ok(), Some(1));
        let err = first_or_not_found::<i32>(vec![], || "Product not found: x".to_string());
        assert!(matches!(err, Err(CmsError::NotFound(msg)) if msg == "Product not found: x"));
    }
}
