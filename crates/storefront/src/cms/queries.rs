//! GraphQL operations against the CMS.
//!
//! The CMS generates its GraphQL schema from the document types, so there is
//! no schema file to derive from; each operation implements
//! [`GraphQLQuery`] by hand. List operations alias their root field to
//! `items` so they all share [`Items`] as response data.

use graphql_client::{GraphQLQuery, QueryBody};
use serde::{Deserialize, Serialize};

use threadline_core::cms::{Banner, Category, Color, GridItem, Product, Size, Subcategory};

/// Response data of every list operation.
#[derive(Debug, Clone, Deserialize)]
pub struct Items<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Operations without variables.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NoVariables {}

#[derive(Debug, Clone, Serialize)]
pub struct SlugVariables {
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdVariables {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdsVariables {
    pub ids: Vec<String>,
}

macro_rules! cms_query {
    ($(#[$meta:meta])* $name:ident($vars:ty) -> $data:ty = $query:expr) => {
        $(#[$meta])*
        pub struct $name;

        impl GraphQLQuery for $name {
            type Variables = $vars;
            type ResponseData = $data;

            fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
                QueryBody {
                    variables,
                    query: $query,
                    operation_name: stringify!($name),
                }
            }
        }
    };
}

macro_rules! image_fields {
    () => {
        "url alt"
    };
}

macro_rules! category_fields {
    () => {
        concat!("_id name slug { current } description image { ", image_fields!(), " }")
    };
}

macro_rules! subcategory_fields {
    () => {
        concat!(
            "_id name slug { current } category { _id } description image { ",
            image_fields!(),
            " }"
        )
    };
}

macro_rules! product_fields {
    () => {
        concat!(
            "_id name slug { current } description category { _id } subcategory { _id } ",
            "featured available ",
            "variants { _key name sku color { _id } sizes { _id } price stock available images { ",
            image_fields!(),
            " } } media { ",
            image_fields!(),
            " }"
        )
    };
}

cms_query! {
    /// Every category, alphabetically.
    AllCategories(NoVariables) -> Items<Category> = concat!(
        "query AllCategories { items: allCategory(sort: [{ name: ASC }]) { ",
        category_fields!(),
        " } }"
    )
}

cms_query! {
    CategoryBySlug(SlugVariables) -> Items<Category> = concat!(
        "query CategoryBySlug($slug: String!) { ",
        "items: allCategory(where: { slug: { current: { eq: $slug } } }, limit: 1) { ",
        category_fields!(),
        " } }"
    )
}

cms_query! {
    SubcategoriesByCategory(IdVariables) -> Items<Subcategory> = concat!(
        "query SubcategoriesByCategory($id: ID!) { ",
        "items: allSubcategory(where: { category: { _id: { eq: $id } } }, sort: [{ name: ASC }]) { ",
        subcategory_fields!(),
        " } }"
    )
}

cms_query! {
    SubcategoryBySlug(SlugVariables) -> Items<Subcategory> = concat!(
        "query SubcategoryBySlug($slug: String!) { ",
        "items: allSubcategory(where: { slug: { current: { eq: $slug } } }, limit: 1) { ",
        subcategory_fields!(),
        " } }"
    )
}

cms_query! {
    ProductsBySubcategory(IdVariables) -> Items<Product> = concat!(
        "query ProductsBySubcategory($id: ID!) { ",
        "items: allProduct(where: { subcategory: { _id: { eq: $id } } }, sort: [{ name: ASC }]) { ",
        product_fields!(),
        " } }"
    )
}

cms_query! {
    AllProducts(NoVariables) -> Items<Product> = concat!(
        "query AllProducts { items: allProduct(sort: [{ name: ASC }]) { ",
        product_fields!(),
        " } }"
    )
}

cms_query! {
    FeaturedProducts(NoVariables) -> Items<Product> = concat!(
        "query FeaturedProducts { ",
        "items: allProduct(where: { featured: { eq: true } }, sort: [{ name: ASC }]) { ",
        product_fields!(),
        " } }"
    )
}

cms_query! {
    ProductBySlug(SlugVariables) -> Items<Product> = concat!(
        "query ProductBySlug($slug: String!) { ",
        "items: allProduct(where: { slug: { current: { eq: $slug } } }, limit: 1) { ",
        product_fields!(),
        " } }"
    )
}

cms_query! {
    /// Products by document id, used for pricing.
    ProductsByIds(IdsVariables) -> Items<Product> = concat!(
        "query ProductsByIds($ids: [ID!]!) { items: allProduct(where: { _id: { in: $ids } }) { ",
        product_fields!(),
        " } }"
    )
}

cms_query! {
    /// Active banners in display order.
    ActiveBanners(NoVariables) -> Items<Banner> = concat!(
        "query ActiveBanners { ",
        "items: allBanner(where: { active: { eq: true } }, sort: [{ sortOrder: ASC }]) { ",
        "_id title subtitle image { ",
        image_fields!(),
        " } linkUrl sortOrder active } }"
    )
}

cms_query! {
    GridItems(NoVariables) -> Items<GridItem> = concat!(
        "query GridItems { items: allGridItem(sort: [{ sortOrder: ASC }]) { ",
        "_id title image { ",
        image_fields!(),
        " } linkUrl sortOrder } }"
    )
}

cms_query! {
    AllColors(NoVariables) -> Items<Color> =
        "query AllColors { items: allColor(sort: [{ name: ASC }]) { _id name hex } }"
}

cms_query! {
    AllSizes(NoVariables) -> Items<Size> =
        "query AllSizes { items: allSize(sort: [{ sortOrder: ASC }]) { _id name sortOrder } }"
}
