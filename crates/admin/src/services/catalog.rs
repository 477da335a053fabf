//! Catalog management over the CMS.
//!
//! Every write path (RPC procedures, form actions, CLI seeding) goes through
//! [`CatalogService`], which owns the rules the CMS itself does not enforce:
//!
//! - slugs default to the slugified name and must be unique per type
//! - subcategories reference an existing category
//! - products reference an existing category, a subcategory of that
//!   category, and existing colors and sizes
//! - documents still referenced elsewhere cannot be deleted

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, instrument};
use validator::{Validate, ValidationError, ValidationErrors};

use threadline_core::cms::{
    Banner, Category, Color, GridItem, Media, Product, Reference, Size, Slug, Subcategory,
};
use threadline_core::slug::{MAX_SLUG_LENGTH, is_valid_slug, slugify};
use threadline_core::validation::FieldErrors;

use crate::cms::{CatalogDocument, CmsClient, CmsError, Mutation, Patch};

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Input failed validation or a reference check.
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// The document does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The document is still referenced.
    #[error("{0}")]
    Conflict(String),

    /// CMS request failed.
    #[error("CMS error: {0}")]
    Cms(#[from] CmsError),
}

impl From<FieldErrors> for CatalogError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<ValidationErrors> for CatalogError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(FieldErrors::from(errors))
    }
}

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImageInput {
    #[validate(url, length(max = 2048))]
    pub url: String,
    #[validate(length(max = 256))]
    #[serde(default)]
    pub alt: Option<String>,
}

impl From<ImageInput> for Media {
    fn from(input: ImageInput) -> Self {
        Self {
            url: input.url,
            alt: input.alt.filter(|alt| !alt.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(max = 96))]
    #[serde(default)]
    pub slug: Option<String>,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: Option<String>,
    #[validate(nested)]
    #[serde(default)]
    pub image: Option<ImageInput>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryInput {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(max = 96))]
    #[serde(default)]
    pub slug: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub category_id: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: Option<String>,
    #[validate(nested)]
    #[serde(default)]
    pub image: Option<ImageInput>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ColorInput {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(custom(function = "validate_hex"))]
    pub hex: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SizeInput {
    #[validate(length(min = 1, max = 32))]
    pub name: String,
    #[validate(range(min = 0, max = 10_000))]
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BannerInput {
    #[validate(length(min = 1, max = 128))]
    pub title: String,
    #[validate(length(max = 256))]
    #[serde(default)]
    pub subtitle: Option<String>,
    #[validate(nested)]
    pub image: ImageInput,
    #[validate(custom(function = "validate_link"))]
    #[serde(default)]
    pub link_url: Option<String>,
    #[validate(range(min = 0, max = 10_000))]
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GridItemInput {
    #[validate(length(min = 1, max = 128))]
    pub title: String,
    #[validate(nested)]
    pub image: ImageInput,
    #[validate(custom(function = "validate_link"))]
    #[serde(default)]
    pub link_url: Option<String>,
    #[validate(range(min = 0, max = 10_000))]
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VariantInput {
    /// Existing variant key; new variants get one assigned.
    #[validate(length(min = 1, max = 64))]
    #[serde(default)]
    pub key: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(max = 64))]
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub color_id: Option<String>,
    #[validate(length(max = 20))]
    #[serde(default)]
    pub size_ids: Vec<String>,
    #[validate(custom(function = "validate_price"))]
    pub price: Decimal,
    #[validate(range(max = 1_000_000))]
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default = "default_true")]
    pub available: bool,
    #[validate(length(max = 20), nested)]
    #[serde(default)]
    pub images: Vec<ImageInput>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(max = 96))]
    #[serde(default)]
    pub slug: Option<String>,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub category_id: String,
    #[validate(length(min = 1, max = 128))]
    pub subcategory_id: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_true")]
    pub available: bool,
    #[validate(length(min = 1, max = 100), nested)]
    pub variants: Vec<VariantInput>,
    #[validate(length(max = 20), nested)]
    #[serde(default)]
    pub media: Vec<ImageInput>,
}

/// Result of a delete.
#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
    pub id: String,
}

const fn default_true() -> bool {
    true
}

fn validate_hex(hex: &str) -> Result<(), ValidationError> {
    let digits = hex.strip_prefix('#').unwrap_or_default();
    if hex.len() == 7 && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ValidationError::new("hex").with_message("must look like #a1b2c3".into()))
    }
}

fn validate_link(link: &str) -> Result<(), ValidationError> {
    let relative = link.starts_with('/') && !link.starts_with("//");
    let absolute = url::Url::parse(link)
        .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some());
    if link.len() <= 2048 && (relative || absolute) {
        Ok(())
    } else {
        Err(ValidationError::new("link")
            .with_message("must be a path starting with / or an http(s) URL".into()))
    }
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price <= Decimal::ZERO {
        return Err(ValidationError::new("price").with_message("must be greater than 0".into()));
    }
    if price.scale() > 2 && price.normalize().scale() > 2 {
        return Err(ValidationError::new("price").with_message("must have at most 2 decimals".into()));
    }
    Ok(())
}

/// Resolve the slug for a document: the supplied one, or the slugified name.
fn resolve_slug(name: &str, slug: Option<&str>) -> Result<String, FieldErrors> {
    match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) if is_valid_slug(slug) => Ok(slug.to_string()),
        Some(_) => Err(FieldErrors::new().with(
            "slug",
            "may only contain lowercase letters, digits and single dashes",
        )),
        None => {
            let generated = slugify(name);
            if generated.is_empty() {
                Err(FieldErrors::new().with("slug", "cannot be generated from this name"))
            } else {
                debug_assert!(generated.len() <= MAX_SLUG_LENGTH);
                Ok(generated)
            }
        }
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A fresh key for an array item.
fn new_key() -> String {
    uuid::Uuid::new_v4().simple().to_string().chars().take(12).collect()
}

/// Attach `_key` to every object in a list, as the CMS requires for arrays.
fn keyed(items: Vec<Value>) -> Value {
    Value::Array(
        items
            .into_iter()
            .map(|mut item| {
                if let Value::Object(map) = &mut item
                    && !map.contains_key("_key")
                {
                    map.insert("_key".to_string(), Value::String(new_key()));
                }
                item
            })
            .collect(),
    )
}

fn image_value(image: Option<ImageInput>) -> Value {
    image.map_or(Value::Null, |image| json!(Media::from(image)))
}

/// Documents with a URL slug.
trait Slugged {
    fn slug(&self) -> &Slug;
}

impl Slugged for Category {
    fn slug(&self) -> &Slug {
        &self.slug
    }
}

impl Slugged for Subcategory {
    fn slug(&self) -> &Slug {
        &self.slug
    }
}

impl Slugged for Product {
    fn slug(&self) -> &Slug {
        &self.slug
    }
}

// =============================================================================
// Service
// =============================================================================

/// Catalog operations shared by every admin transport.
pub struct CatalogService<'a> {
    cms: &'a CmsClient,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(cms: &'a CmsClient) -> Self {
        Self { cms }
    }

    /// All documents of a type, including inactive ones.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Cms` if the CMS request fails.
    pub async fn list<D: CatalogDocument>(&self) -> Result<Vec<D>, CatalogError> {
        Ok(self.cms.list::<D>().await?)
    }

    /// A document by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if no such document exists.
    pub async fn get<D: CatalogDocument>(&self, id: &str) -> Result<D, CatalogError> {
        self.cms
            .get::<D>(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("{} {id}", D::LABEL)))
    }

    // -------------------------------------------------------------------------
    // Categories
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for invalid input or a taken slug.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(&self, input: CategoryInput) -> Result<Category, CatalogError> {
        input.validate()?;
        let slug = resolve_slug(&input.name, input.slug.as_deref())?;
        self.ensure_unique_slug::<Category>(&slug, None).await?;
        self.create(category_fields(input, slug)).await
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown id and
    /// `CatalogError::Validation` for invalid input or a taken slug.
    #[instrument(skip(self, input))]
    pub async fn update_category(
        &self,
        id: &str,
        input: CategoryInput,
    ) -> Result<Category, CatalogError> {
        input.validate()?;
        self.get::<Category>(id).await?;
        let slug = resolve_slug(&input.name, input.slug.as_deref())?;
        self.ensure_unique_slug::<Category>(&slug, Some(id)).await?;
        self.update(id, category_fields(input, slug)).await
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Conflict` if subcategories or products still
    /// belong to the category.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: &str) -> Result<Deleted, CatalogError> {
        self.get::<Category>(id).await?;

        let subcategories = self
            .list::<Subcategory>()
            .await?
            .into_iter()
            .filter(|s| s.category.id == id)
            .count();
        if subcategories > 0 {
            return Err(CatalogError::Conflict(format!(
                "category still has {subcategories} subcategories"
            )));
        }

        let products = self
            .list::<Product>()
            .await?
            .into_iter()
            .filter(|p| p.category.id == id)
            .count();
        if products > 0 {
            return Err(CatalogError::Conflict(format!(
                "category is still used by {products} products"
            )));
        }

        self.delete::<Category>(id).await
    }

    // -------------------------------------------------------------------------
    // Subcategories
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for invalid input, a taken slug or
    /// an unknown category.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_subcategory(
        &self,
        input: SubcategoryInput,
    ) -> Result<Subcategory, CatalogError> {
        input.validate()?;
        let slug = resolve_slug(&input.name, input.slug.as_deref())?;
        self.ensure_category_exists(&input.category_id).await?;
        self.ensure_unique_slug::<Subcategory>(&slug, None).await?;
        self.create(subcategory_fields(input, slug)).await
    }

    /// # Errors
    ///
    /// Same as [`CatalogService::create_subcategory`], plus
    /// `CatalogError::NotFound` for an unknown id.
    #[instrument(skip(self, input))]
    pub async fn update_subcategory(
        &self,
        id: &str,
        input: SubcategoryInput,
    ) -> Result<Subcategory, CatalogError> {
        input.validate()?;
        self.get::<Subcategory>(id).await?;
        let slug = resolve_slug(&input.name, input.slug.as_deref())?;
        self.ensure_category_exists(&input.category_id).await?;
        self.ensure_unique_slug::<Subcategory>(&slug, Some(id)).await?;
        self.update(id, subcategory_fields(input, slug)).await
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Conflict` if products still belong to the
    /// subcategory.
    #[instrument(skip(self))]
    pub async fn delete_subcategory(&self, id: &str) -> Result<Deleted, CatalogError> {
        self.get::<Subcategory>(id).await?;

        let products = self
            .list::<Product>()
            .await?
            .into_iter()
            .filter(|p| p.subcategory.id == id)
            .count();
        if products > 0 {
            return Err(CatalogError::Conflict(format!(
                "subcategory still has {products} products"
            )));
        }

        self.delete::<Subcategory>(id).await
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for invalid input, a taken slug or
    /// a reference to a missing or mismatched document.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: ProductInput) -> Result<Product, CatalogError> {
        input.validate()?;
        let slug = resolve_slug(&input.name, input.slug.as_deref())?;
        self.check_product_references(&input).await?;
        self.ensure_unique_slug::<Product>(&slug, None).await?;
        self.create(product_fields(input, slug)).await
    }

    /// # Errors
    ///
    /// Same as [`CatalogService::create_product`], plus
    /// `CatalogError::NotFound` for an unknown id.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        id: &str,
        input: ProductInput,
    ) -> Result<Product, CatalogError> {
        input.validate()?;
        self.get::<Product>(id).await?;
        let slug = resolve_slug(&input.name, input.slug.as_deref())?;
        self.check_product_references(&input).await?;
        self.ensure_unique_slug::<Product>(&slug, Some(id)).await?;
        self.update(id, product_fields(input, slug)).await
    }

    /// Products are leaves; orders keep their own snapshots.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown id.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: &str) -> Result<Deleted, CatalogError> {
        self.get::<Product>(id).await?;
        self.delete::<Product>(id).await
    }

    async fn check_product_references(&self, input: &ProductInput) -> Result<(), CatalogError> {
        let mut errors = FieldErrors::new();

        let category = self.cms.get::<Category>(&input.category_id).await?;
        if category.is_none() {
            errors.add("categoryId", "does not exist");
        }

        match self.cms.get::<Subcategory>(&input.subcategory_id).await? {
            None => errors.add("subcategoryId", "does not exist"),
            Some(sub) if category.is_some() && sub.category.id != input.category_id => {
                errors.add("subcategoryId", "does not belong to the selected category");
            }
            Some(_) => {}
        }

        let uses_colors = input.variants.iter().any(|v| v.color_id.is_some());
        let uses_sizes = input.variants.iter().any(|v| !v.size_ids.is_empty());
        let colors = if uses_colors {
            self.list::<Color>().await?
        } else {
            Vec::new()
        };
        let sizes = if uses_sizes {
            self.list::<Size>().await?
        } else {
            Vec::new()
        };

        for (index, variant) in input.variants.iter().enumerate() {
            if let Some(color_id) = &variant.color_id
                && !colors.iter().any(|c| &c.id == color_id)
            {
                errors.add(format!("variants[{index}].colorId"), "does not exist");
            }
            for size_id in &variant.size_ids {
                if !sizes.iter().any(|s| &s.id == size_id) {
                    errors.add(
                        format!("variants[{index}].sizeIds"),
                        format!("size {size_id} does not exist"),
                    );
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        for (index, variant) in input.variants.iter().enumerate() {
            if let Some(key) = &variant.key
                && !seen.insert(key.as_str())
            {
                errors.add(format!("variants[{index}].key"), "is used by another variant");
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::Validation(errors))
        }
    }

    // -------------------------------------------------------------------------
    // Banners and grid items
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for invalid input.
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_banner(&self, input: BannerInput) -> Result<Banner, CatalogError> {
        input.validate()?;
        self.create(banner_fields(input)).await
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown id.
    #[instrument(skip(self, input))]
    pub async fn update_banner(&self, id: &str, input: BannerInput) -> Result<Banner, CatalogError> {
        input.validate()?;
        self.get::<Banner>(id).await?;
        self.update(id, banner_fields(input)).await
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown id.
    #[instrument(skip(self))]
    pub async fn delete_banner(&self, id: &str) -> Result<Deleted, CatalogError> {
        self.get::<Banner>(id).await?;
        self.delete::<Banner>(id).await
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for invalid input.
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_grid_item(&self, input: GridItemInput) -> Result<GridItem, CatalogError> {
        input.validate()?;
        self.create(grid_item_fields(input)).await
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown id.
    #[instrument(skip(self, input))]
    pub async fn update_grid_item(
        &self,
        id: &str,
        input: GridItemInput,
    ) -> Result<GridItem, CatalogError> {
        input.validate()?;
        self.get::<GridItem>(id).await?;
        self.update(id, grid_item_fields(input)).await
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown id.
    #[instrument(skip(self))]
    pub async fn delete_grid_item(&self, id: &str) -> Result<Deleted, CatalogError> {
        self.get::<GridItem>(id).await?;
        self.delete::<GridItem>(id).await
    }

    // -------------------------------------------------------------------------
    // Colors and sizes
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for invalid input.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_color(&self, input: ColorInput) -> Result<Color, CatalogError> {
        input.validate()?;
        self.create(color_fields(input)).await
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown id.
    #[instrument(skip(self, input))]
    pub async fn update_color(&self, id: &str, input: ColorInput) -> Result<Color, CatalogError> {
        input.validate()?;
        self.get::<Color>(id).await?;
        self.update(id, color_fields(input)).await
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Conflict` if a product variant uses the color.
    #[instrument(skip(self))]
    pub async fn delete_color(&self, id: &str) -> Result<Deleted, CatalogError> {
        self.get::<Color>(id).await?;
        self.ensure_option_unused("color", id).await?;
        self.delete::<Color>(id).await
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for invalid input.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_size(&self, input: SizeInput) -> Result<Size, CatalogError> {
        input.validate()?;
        self.create(size_fields(input)).await
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown id.
    #[instrument(skip(self, input))]
    pub async fn update_size(&self, id: &str, input: SizeInput) -> Result<Size, CatalogError> {
        input.validate()?;
        self.get::<Size>(id).await?;
        self.update(id, size_fields(input)).await
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Conflict` if a product variant uses the size.
    #[instrument(skip(self))]
    pub async fn delete_size(&self, id: &str) -> Result<Deleted, CatalogError> {
        self.get::<Size>(id).await?;
        self.ensure_option_unused("size", id).await?;
        self.delete::<Size>(id).await
    }

    // -------------------------------------------------------------------------
    // Shared helpers
    // -------------------------------------------------------------------------

    async fn ensure_category_exists(&self, id: &str) -> Result<(), CatalogError> {
        if self.cms.get::<Category>(id).await?.is_none() {
            return Err(FieldErrors::new().with("categoryId", "does not exist").into());
        }
        Ok(())
    }

    async fn ensure_unique_slug<D>(&self, slug: &str, except: Option<&str>) -> Result<(), CatalogError>
    where
        D: CatalogDocument + Slugged,
    {
        let taken = self
            .list::<D>()
            .await?
            .iter()
            .any(|doc| doc.slug().current == slug && Some(doc.id()) != except);
        if taken {
            return Err(FieldErrors::new()
                .with("slug", format!("is already used by another {}", D::LABEL))
                .into());
        }
        Ok(())
    }

    async fn ensure_option_unused(&self, label: &str, id: &str) -> Result<(), CatalogError> {
        let products = self
            .list::<Product>()
            .await?
            .into_iter()
            .filter(|p| p.uses_option(id))
            .count();
        if products > 0 {
            return Err(CatalogError::Conflict(format!(
                "{label} is still used by {products} products"
            )));
        }
        Ok(())
    }

    async fn create<D: CatalogDocument>(&self, fields: Value) -> Result<D, CatalogError> {
        let results = self.cms.mutate(&[Mutation::create(D::TYPE, fields)]).await?;
        let result = results.into_iter().next().ok_or_else(|| CmsError::Rejected {
            status: 200,
            message: "mutation returned no result".to_string(),
        })?;
        info!(kind = D::TYPE, id = %result.id, "Document created");
        self.written(result.id, result.document).await
    }

    async fn update<D: CatalogDocument>(&self, id: &str, fields: Value) -> Result<D, CatalogError> {
        let results = self
            .cms
            .mutate(&[Mutation::Patch(Patch::from_fields(id, fields))])
            .await?;
        info!(kind = D::TYPE, id, "Document updated");
        let document = results.into_iter().next().and_then(|r| r.document);
        self.written(id.to_string(), document).await
    }

    async fn delete<D: CatalogDocument>(&self, id: &str) -> Result<Deleted, CatalogError> {
        self.cms.mutate(&[Mutation::delete(id)]).await?;
        info!(kind = D::TYPE, id, "Document deleted");
        Ok(Deleted { id: id.to_string() })
    }

    /// The document as written: parsed from the mutate response, or read back.
    async fn written<D: CatalogDocument>(
        &self,
        id: String,
        document: Option<Value>,
    ) -> Result<D, CatalogError> {
        if let Some(parsed) = document.and_then(|doc| serde_json::from_value::<D>(doc).ok()) {
            return Ok(parsed);
        }
        self.get::<D>(&id).await
    }
}

// =============================================================================
// Field builders
// =============================================================================

fn category_fields(input: CategoryInput, slug: String) -> Value {
    json!({
        "name": input.name.trim(),
        "slug": Slug::new(slug),
        "description": blank_to_none(input.description),
        "image": image_value(input.image),
    })
}

fn subcategory_fields(input: SubcategoryInput, slug: String) -> Value {
    json!({
        "name": input.name.trim(),
        "slug": Slug::new(slug),
        "category": Reference::to(input.category_id),
        "description": blank_to_none(input.description),
        "image": image_value(input.image),
    })
}

fn product_fields(input: ProductInput, slug: String) -> Value {
    let variants = input
        .variants
        .into_iter()
        .map(|variant| {
            json!({
                "_key": variant.key.unwrap_or_else(new_key),
                "name": variant.name.trim(),
                "sku": blank_to_none(variant.sku),
                "color": variant.color_id.map(Reference::to),
                "sizes": keyed(
                    variant.size_ids.into_iter().map(|id| json!(Reference::to(id))).collect()
                ),
                "price": variant.price.round_dp(2),
                "stock": variant.stock,
                "available": variant.available,
                "images": keyed(
                    variant.images.into_iter().map(|image| json!(Media::from(image))).collect()
                ),
            })
        })
        .collect();

    json!({
        "name": input.name.trim(),
        "slug": Slug::new(slug),
        "description": blank_to_none(input.description),
        "category": Reference::to(input.category_id),
        "subcategory": Reference::to(input.subcategory_id),
        "featured": input.featured,
        "available": input.available,
        "variants": Value::Array(variants),
        "media": keyed(input.media.into_iter().map(|image| json!(Media::from(image))).collect()),
    })
}

fn banner_fields(input: BannerInput) -> Value {
    json!({
        "title": input.title.trim(),
        "subtitle": blank_to_none(input.subtitle),
        "image": Media::from(input.image),
        "linkUrl": blank_to_none(input.link_url),
        "sortOrder": input.sort_order,
        "active": input.active,
    })
}

fn grid_item_fields(input: GridItemInput) -> Value {
    json!({
        "title": input.title.trim(),
        "image": Media::from(input.image),
        "linkUrl": blank_to_none(input.link_url),
        "sortOrder": input.sort_order,
    })
}

fn color_fields(input: ColorInput) -> Value {
    json!({
        "name": input.name.trim(),
        "hex": input.hex.to_ascii_lowercase(),
    })
}

fn size_fields(input: SizeInput) -> Value {
    json!({
        "name": input.name.trim(),
        "sortOrder": input.sort_order,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_slug_defaults_to_name() {
        assert_eq!(resolve_slug("Linen Shirts", None).unwrap(), "linen-shirts");
        assert_eq!(resolve_slug("Linen Shirts", Some("  ")).unwrap(), "linen-shirts");
        assert_eq!(resolve_slug("Linen", Some("summer-linen")).unwrap(), "summer-linen");
    }

    #[test]
    fn test_resolve_slug_rejects_bad_input() {
        let errors = resolve_slug("Linen", Some("Summer Linen")).unwrap_err();
        assert!(errors.get("slug").is_some());
        let errors = resolve_slug("!!!", None).unwrap_err();
        assert_eq!(
            errors.get("slug").unwrap(),
            ["cannot be generated from this name".to_string()]
        );
    }

    #[test]
    fn test_color_validation() {
        let ok = ColorInput {
            name: "Sand".to_string(),
            hex: "#D8C9A7".to_string(),
        };
        assert!(ok.validate().is_ok());
        assert_eq!(color_fields(ok)["hex"], "#d8c9a7");

        let bad = ColorInput {
            name: String::new(),
            hex: "d8c9a7".to_string(),
        };
        let errors = FieldErrors::from(bad.validate().unwrap_err());
        assert!(errors.get("name").is_some());
        assert_eq!(errors.get("hex").unwrap(), ["must look like #a1b2c3".to_string()]);
    }

    #[test]
    fn test_link_validation() {
        assert!(validate_link("/collections/linen").is_ok());
        assert!(validate_link("https://threadline.test/sale").is_ok());
        assert!(validate_link("//evil.test").is_err());
        assert!(validate_link("javascript:alert(1)").is_err());
    }

    #[test]
    fn test_price_validation() {
        assert!(validate_price(&Decimal::new(4900, 2)).is_ok());
        assert!(validate_price(&Decimal::new(49_000, 3)).is_ok());
        assert!(validate_price(&Decimal::ZERO).is_err());
        assert!(validate_price(&Decimal::new(4999, 3)).is_err());
    }

    #[test]
    fn test_product_input_errors_use_camel_case_paths() {
        let input: ProductInput = serde_json::from_value(json!({
            "name": "Linen Shirt",
            "categoryId": "",
            "subcategoryId": "sub-1",
            "variants": [{ "name": "Sand", "price": "0" }]
        }))
        .unwrap();
        let errors = FieldErrors::from(input.validate().unwrap_err());
        assert!(errors.get("categoryId").is_some());
        assert_eq!(
            errors.get("variants[0].price").unwrap(),
            ["must be greater than 0".to_string()]
        );
    }

    #[test]
    fn test_image_lists_are_capped() {
        let images: Vec<Value> = (0..21)
            .map(|i| json!({ "url": format!("https://media.test/{i}.jpg") }))
            .collect();
        let input: ProductInput = serde_json::from_value(json!({
            "name": "Linen Shirt",
            "categoryId": "cat-1",
            "subcategoryId": "sub-1",
            "variants": [{ "name": "Sand", "price": "49.00", "images": images }],
            "media": images
        }))
        .unwrap();
        let errors = FieldErrors::from(input.validate().unwrap_err());
        assert!(!errors.is_empty());

        let twenty = &images[..20];
        let within: ProductInput = serde_json::from_value(json!({
            "name": "Linen Shirt",
            "categoryId": "cat-1",
            "subcategoryId": "sub-1",
            "variants": [{ "name": "Sand", "price": "49.00", "images": twenty }],
            "media": twenty
        }))
        .unwrap();
        assert!(within.validate().is_ok());
    }

    #[test]
    fn test_product_fields_shape() {
        let input: ProductInput = serde_json::from_value(json!({
            "name": " Linen Shirt ",
            "categoryId": "cat-1",
            "subcategoryId": "sub-1",
            "variants": [
                { "key": "v1", "name": "Sand", "price": "49.00", "colorId": "color-sand",
                  "sizeIds": ["size-m"], "images": [{ "url": "https://media.test/a.jpg" }] },
                { "name": "Navy", "price": 39.5 }
            ]
        }))
        .unwrap();
        let fields = product_fields(input, "linen-shirt".to_string());

        assert_eq!(fields["name"], "Linen Shirt");
        assert_eq!(fields["category"], json!({ "_type": "reference", "_ref": "cat-1" }));
        assert_eq!(fields["available"], true);
        assert_eq!(fields["variants"][0]["_key"], "v1");
        assert_eq!(fields["variants"][0]["sizes"][0]["_ref"], "size-m");
        assert!(fields["variants"][0]["sizes"][0]["_key"].is_string());
        assert!(fields["variants"][0]["images"][0]["_key"].is_string());
        assert_eq!(fields["variants"][1]["_key"].as_str().unwrap().len(), 12);
        assert!(fields["variants"][1]["color"].is_null());
        assert!(fields["description"].is_null());

        // Written documents read back as products
        let mut doc = fields;
        doc["_id"] = json!("prod-1");
        let product: Product = serde_json::from_value(doc).unwrap();
        assert!(product.uses_option("size-m"));
        assert_eq!(product.slug.current, "linen-shirt");
    }

    #[test]
    fn test_banner_fields_drop_blank_optionals() {
        let input: BannerInput = serde_json::from_value(json!({
            "title": "Summer",
            "subtitle": "  ",
            "image": { "url": "https://media.test/b.jpg", "alt": "" }
        }))
        .unwrap();
        assert!(input.active);
        let fields = banner_fields(input);
        assert!(fields["subtitle"].is_null());
        assert_eq!(fields["image"], json!({ "url": "https://media.test/b.jpg" }));
    }
}
