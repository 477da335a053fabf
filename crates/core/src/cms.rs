//! Content documents stored in the headless CMS.
//!
//! These are the shapes the storefront reads over GraphQL and the admin
//! writes through the mutate API. Document ids are CMS strings, not
//! relational ids. References serialize as `{"_type":"reference","_ref":…}`
//! and also accept the resolved `{"_id":…}` form returned by GraphQL.
//!
//! [`SCHEMA`] describes every document type for deployment to the content
//! platform (`tl-cli cms schema`).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::checkout::{CatalogPrice, PriceBook};

/// A CMS document type.
pub trait Document: serde::de::DeserializeOwned + Serialize + Send + Sync + 'static {
    /// The `_type` value of the document.
    const TYPE: &'static str;

    /// The document id.
    fn id(&self) -> &str;
}

/// URL slug object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slug {
    pub current: String,
}

impl Slug {
    #[must_use]
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            current: current.into(),
        }
    }
}

/// Reference to another document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "_type", default = "reference_type")]
    pub kind: String,
    #[serde(rename = "_ref", alias = "_id")]
    pub id: String,
}

fn reference_type() -> String {
    "reference".to_string()
}

impl Reference {
    #[must_use]
    pub fn to(id: impl Into<String>) -> Self {
        Self {
            kind: reference_type(),
            id: id.into(),
        }
    }
}

/// An image hosted on the media domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub slug: Slug,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<Media>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub slug: Slug,
    pub category: Reference,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<Media>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Color {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    /// `#rrggbb`
    pub hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Size {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub sort_order: i32,
}

/// Homepage hero banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    pub image: Media,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub sort_order: i32,
    #[serde(default = "default_true", deserialize_with = "nullable_true")]
    pub active: bool,
}

/// Homepage grid tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub image: Media,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub sort_order: i32,
}

/// Purchasable variant embedded in a [`Product`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    #[serde(rename = "_key")]
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub color: Option<Reference>,
    #[serde(default, deserialize_with = "nullable")]
    pub sizes: Vec<Reference>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default = "default_true", deserialize_with = "nullable_true")]
    pub available: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub images: Vec<Media>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub slug: Slug,
    #[serde(default)]
    pub description: Option<String>,
    pub category: Reference,
    pub subcategory: Reference,
    #[serde(default, deserialize_with = "nullable")]
    pub featured: bool,
    #[serde(default = "default_true", deserialize_with = "nullable_true")]
    pub available: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub variants: Vec<Variant>,
    #[serde(default, deserialize_with = "nullable")]
    pub media: Vec<Media>,
}

const fn default_true() -> bool {
    true
}

/// GraphQL returns `null` for unset fields; treat it like a missing one.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

impl Product {
    /// Find an embedded variant by key.
    #[must_use]
    pub fn variant(&self, key: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.key == key)
    }

    /// Lowest variant price, if the product has any variants.
    #[must_use]
    pub fn from_price(&self) -> Option<Decimal> {
        self.variants.iter().map(|v| v.price).min()
    }

    /// Image used on cart lines: the variant's first image, else the product's.
    #[must_use]
    pub fn image_for(&self, variant_key: &str) -> Option<&Media> {
        self.variant(variant_key)
            .and_then(|v| v.images.first())
            .or_else(|| self.media.first())
    }

    /// Whether this product references the given color or size document.
    #[must_use]
    pub fn uses_option(&self, option_id: &str) -> bool {
        self.variants.iter().any(|v| {
            v.color.as_ref().is_some_and(|c| c.id == option_id)
                || v.sizes.iter().any(|s| s.id == option_id)
        })
    }

    /// Add this product's variants to a price book.
    pub fn extend_price_book(&self, book: &mut PriceBook) {
        for variant in &self.variants {
            book.insert(
                (self.id.clone(), variant.key.clone()),
                CatalogPrice {
                    unit_price: variant.price,
                    available: self.available && variant.available,
                    stock: variant.stock,
                },
            );
        }
    }
}

macro_rules! impl_document {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Document for $ty {
                const TYPE: &'static str = $name;

                fn id(&self) -> &str {
                    &self.id
                }
            }
        )*
    };
}

impl_document! {
    Category => "category",
    Subcategory => "subcategory",
    Product => "product",
    Banner => "banner",
    GridItem => "gridItem",
    Color => "color",
    Size => "size",
}

// =============================================================================
// Schema descriptor
// =============================================================================

/// Field kinds understood by the content platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    String,
    Text,
    Number,
    Boolean,
    Slug,
    Url,
    Image,
    Reference,
    Array,
    Object,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub name: &'static str,
    pub title: &'static str,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub required: bool,
    /// Target document types for references (or array items).
    #[serde(skip_serializing_if = "is_empty")]
    pub to: &'static [&'static str],
    /// Item type for arrays and nested fields for objects.
    #[serde(skip_serializing_if = "is_empty")]
    pub of: &'static [FieldSchema],
    /// Source field for slug generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSchema {
    pub name: &'static str,
    pub title: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub fields: &'static [FieldSchema],
}

impl DocumentSchema {
    /// Look up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_empty<T>(items: &&[T]) -> bool {
    items.is_empty()
}

const fn field(name: &'static str, title: &'static str, kind: FieldKind, required: bool) -> FieldSchema {
    FieldSchema {
        name,
        title,
        kind,
        required,
        to: &[],
        of: &[],
        source: None,
    }
}

const fn slug_field() -> FieldSchema {
    FieldSchema {
        source: Some("name"),
        ..field("slug", "Slug", FieldKind::Slug, true)
    }
}

const fn reference(name: &'static str, title: &'static str, to: &'static [&'static str], required: bool) -> FieldSchema {
    FieldSchema {
        to,
        ..field(name, title, FieldKind::Reference, required)
    }
}

const fn array(name: &'static str, title: &'static str, of: &'static [FieldSchema]) -> FieldSchema {
    FieldSchema {
        of,
        ..field(name, title, FieldKind::Array, false)
    }
}

const IMAGE_FIELDS: &[FieldSchema] = &[
    field("url", "URL", FieldKind::Url, true),
    field("alt", "Alternative text", FieldKind::String, false),
];

const IMAGE_LIST: &[FieldSchema] = &[FieldSchema {
    of: IMAGE_FIELDS,
    ..field("image", "Image", FieldKind::Image, true)
}];

const SIZE_REFS: &[FieldSchema] = &[reference("size", "Size", &["size"], true)];

const VARIANT_FIELDS: &[FieldSchema] = &[
    field("name", "Name", FieldKind::String, true),
    field("sku", "SKU", FieldKind::String, false),
    reference("color", "Color", &["color"], false),
    array("sizes", "Sizes", SIZE_REFS),
    field("price", "Price", FieldKind::Number, true),
    field("stock", "Stock", FieldKind::Number, false),
    field("available", "Available", FieldKind::Boolean, false),
    array("images", "Images", IMAGE_LIST),
];

const VARIANT_LIST: &[FieldSchema] = &[FieldSchema {
    of: VARIANT_FIELDS,
    ..field("variant", "Variant", FieldKind::Object, true)
}];

/// Every document type, in deployment order.
pub const SCHEMA: &[DocumentSchema] = &[
    DocumentSchema {
        name: "category",
        title: "Category",
        kind: "document",
        fields: &[
            field("name", "Name", FieldKind::String, true),
            slug_field(),
            field("description", "Description", FieldKind::Text, false),
            FieldSchema {
                of: IMAGE_FIELDS,
                ..field("image", "Image", FieldKind::Image, false)
            },
        ],
    },
    DocumentSchema {
        name: "subcategory",
        title: "Subcategory",
        kind: "document",
        fields: &[
            field("name", "Name", FieldKind::String, true),
            slug_field(),
            reference("category", "Category", &["category"], true),
            field("description", "Description", FieldKind::Text, false),
            FieldSchema {
                of: IMAGE_FIELDS,
                ..field("image", "Image", FieldKind::Image, false)
            },
        ],
    },
    DocumentSchema {
        name: "color",
        title: "Color",
        kind: "document",
        fields: &[
            field("name", "Name", FieldKind::String, true),
            field("hex", "Hex value", FieldKind::String, true),
        ],
    },
    DocumentSchema {
        name: "size",
        title: "Size",
        kind: "document",
        fields: &[
            field("name", "Name", FieldKind::String, true),
            field("sortOrder", "Sort order", FieldKind::Number, false),
        ],
    },
    DocumentSchema {
        name: "product",
        title: "Product",
        kind: "document",
        fields: &[
            field("name", "Name", FieldKind::String, true),
            slug_field(),
            field("description", "Description", FieldKind::Text, false),
            reference("category", "Category", &["category"], true),
            reference("subcategory", "Subcategory", &["subcategory"], true),
            field("featured", "Featured", FieldKind::Boolean, false),
            field("available", "Available", FieldKind::Boolean, false),
            array("variants", "Variants", VARIANT_LIST),
            array("media", "Media", IMAGE_LIST),
        ],
    },
    DocumentSchema {
        name: "banner",
        title: "Banner",
        kind: "document",
        fields: &[
            field("title", "Title", FieldKind::String, true),
            field("subtitle", "Subtitle", FieldKind::String, false),
            FieldSchema {
                of: IMAGE_FIELDS,
                ..field("image", "Image", FieldKind::Image, true)
            },
            field("linkUrl", "Link", FieldKind::Url, false),
            field("sortOrder", "Sort order", FieldKind::Number, false),
            field("active", "Active", FieldKind::Boolean, false),
        ],
    },
    DocumentSchema {
        name: "gridItem",
        title: "Grid item",
        kind: "document",
        fields: &[
            field("title", "Title", FieldKind::String, true),
            FieldSchema {
                of: IMAGE_FIELDS,
                ..field("image", "Image", FieldKind::Image, true)
            },
            field("linkUrl", "Link", FieldKind::Url, false),
            field("sortOrder", "Sort order", FieldKind::Number, false),
        ],
    },
];

/// Look up a document schema by type name.
#[must_use]
pub fn schema_for(name: &str) -> Option<&'static DocumentSchema> {
    SCHEMA.iter().find(|doc| doc.name == name)
}
