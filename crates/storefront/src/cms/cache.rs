//! Cache types for CMS responses.

use threadline_core::cms::{Banner, Category, Color, GridItem, Product, Size, Subcategory};

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Categories(Vec<Category>),
    Subcategories(Vec<Subcategory>),
    Products(Vec<Product>),
    Banners(Vec<Banner>),
    GridItems(Vec<GridItem>),
    Colors(Vec<Color>),
    Sizes(Vec<Size>),
}
