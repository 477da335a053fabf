//! GraphQL operations used by the back-office.
//!
//! Unlike the storefront, admin lists include inactive and unavailable
//! documents. Every document type gets a `List` and a `ById` operation,
//! tied to the type through [`CatalogDocument`].

use graphql_client::{GraphQLQuery, QueryBody};
use serde::{Deserialize, Serialize};

use threadline_core::cms::{Banner, Category, Color, Document, GridItem, Product, Size, Subcategory};

/// Response data of every operation; root fields are aliased to `items`.
#[derive(Debug, Clone, Deserialize)]
pub struct Items<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct NoVariables {}

#[derive(Debug, Clone, Serialize)]
pub struct IdVariables {
    pub id: String,
}

/// A document type the back-office can list and fetch by id.
pub trait CatalogDocument: Document + Clone {
    type List: GraphQLQuery<Variables = NoVariables, ResponseData = Items<Self>>;
    type ById: GraphQLQuery<Variables = IdVariables, ResponseData = Items<Self>>;

    /// Human label used in error messages.
    const LABEL: &'static str;
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

/// Declare `List` and `ById` operations for a document type.
macro_rules! catalog_document {
    ($doc:ty, $label:literal, $list:ident, $by_id:ident, $root:literal, $sort:literal, $fields:expr) => {
        cms_query! {
            $list(NoVariables) -> Items<$doc> = concat!(
                "query ", stringify!($list), " { items: ", $root, "(sort: [", $sort, "]) { ",
                $fields,
                " } }"
            )
        }

        cms_query! {
            $by_id(IdVariables) -> Items<$doc> = concat!(
                "query ", stringify!($by_id), "($id: ID!) { items: ", $root,
                "(where: { _id: { eq: $id } }, limit: 1) { ",
                $fields,
                " } }"
            )
        }

        impl CatalogDocument for $doc {
            type List = $list;
            type ById = $by_id;
            const LABEL: &'static str = $label;
        }
    };
}

macro_rules! image_fields {
    () => {
        "url alt"
    };
}

catalog_document!(
    Category, "category", CategoryList, CategoryById, "allCategory", "{ name: ASC }",
    concat!("_id name slug { current } description image { ", image_fields!(), " }")
);

catalog_document!(
    Subcategory, "subcategory", SubcategoryList, SubcategoryById, "allSubcategory", "{ name: ASC }",
    concat!(
        "_id name slug { current } category { _id } description image { ",
        image_fields!(),
        " }"
    )
);

catalog_document!(
    Product, "product", ProductList, ProductById, "allProduct", "{ name: ASC }",
    concat!(
        "_id name slug { current } description category { _id } subcategory { _id } ",
        "featured available ",
        "variants { _key name sku color { _id } sizes { _id } price stock available images { ",
        image_fields!(),
        " } } media { ",
        image_fields!(),
        " }"
    )
);

catalog_document!(
    Banner, "banner", BannerList, BannerById, "allBanner", "{ sortOrder: ASC }",
    concat!(
        "_id title subtitle image { ",
        image_fields!(),
        " } linkUrl sortOrder active"
    )
);

catalog_document!(
    GridItem, "grid item", GridItemList, GridItemById, "allGridItem", "{ sortOrder: ASC }",
    concat!("_id title image { ", image_fields!(), " } linkUrl sortOrder")
);

catalog_document!(
    Color, "color", ColorList, ColorById, "allColor", "{ name: ASC }",
    "_id name hex"
);

catalog_document!(
    Size, "size", SizeList, SizeById, "allSize", "{ sortOrder: ASC }",
    "_id name sortOrder"
);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_includes_inactive() {
        let body = BannerList::build_query(NoVariables {});
        assert_eq!(body.operation_name, "BannerList");
        assert_eq!(
            body.query,
            "query BannerList { items: allBanner(sort: [{ sortOrder: ASC }]) { \
             _id title subtitle image { url alt } linkUrl sortOrder active } }"
        );
        assert!(!body.query.contains("active: { eq: true }"));
    }

    #[test]
    fn test_by_id_query() {
        let body = <Color as CatalogDocument>::ById::build_query(IdVariables {
            id: "color-sand".to_string(),
        });
        assert_eq!(body.operation_name, "ColorById");
        assert!(body.query.starts_with("query ColorById($id: ID!)"));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["variables"]["id"], "color-sand");
    }

    #[test]
    fn test_labels() {
        assert_eq!(<GridItem as CatalogDocument>::LABEL, "grid item");
        assert_eq!(<Product as CatalogDocument>::LABEL, "product");
    }
}
