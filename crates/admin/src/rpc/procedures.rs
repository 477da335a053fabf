//! Procedure table.

use serde::Deserialize;
use validator::Validate;

use threadline_core::cms::{Banner, Category, Color, GridItem, Product, Size, Subcategory};
use threadline_core::{OrderId, OrderStatus};

use super::{IdInput, NoInput, Registry, RpcError, UpdateInput};
use crate::models::OrderListQuery;
use crate::services::CatalogService;
use crate::services::OrderService;
use crate::services::catalog::{
    BannerInput, CategoryInput, ColorInput, GridItemInput, ProductInput, SizeInput,
    SubcategoryInput,
};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CategoryFilter {
    #[validate(length(min = 1, max = 128))]
    #[serde(default)]
    category_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ProductFilter {
    #[validate(length(min = 1, max = 128))]
    #[serde(default)]
    subcategory_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct OrderIdInput {
    id: OrderId,
}

#[derive(Debug, Deserialize, Validate)]
struct StatusUpdate {
    id: OrderId,
    status: OrderStatus,
}

/// Register list/byId/create/update/delete for one document type.
macro_rules! crud {
    ($registry:expr, $prefix:literal, $doc:ty, $input:ty, $create:ident, $update:ident, $delete:ident) => {
        $registry
            .query(
                concat!($prefix, ".byId"),
                |state: AppState, input: IdInput| async move {
                    Ok::<_, RpcError>(CatalogService::new(state.cms()).get::<$doc>(&input.id).await?)
                },
            )
            .mutation(
                concat!($prefix, ".create"),
                |state: AppState, input: $input| async move {
                    Ok::<_, RpcError>(CatalogService::new(state.cms()).$create(input).await?)
                },
            )
            .mutation(
                concat!($prefix, ".update"),
                |state: AppState, input: UpdateInput<$input>| async move {
                    Ok::<_, RpcError>(CatalogService::new(state.cms())
                        .$update(&input.id, input.data)
                        .await?)
                },
            )
            .mutation(
                concat!($prefix, ".delete"),
                |state: AppState, input: IdInput| async move {
                    Ok::<_, RpcError>(CatalogService::new(state.cms()).$delete(&input.id).await?)
                },
            )
    };
}

/// Every procedure the back-office exposes.
#[must_use]
pub fn registry() -> Registry {
    let registry = Registry::new()
        .query("category.list", |state: AppState, _: NoInput| async move {
            list::<Category>(&state).await
        })
        .query(
            "subcategory.list",
            |state: AppState, input: CategoryFilter| async move {
                let mut items = list::<Subcategory>(&state).await?;
                if let Some(category_id) = &input.category_id {
                    items.retain(|s| &s.category.id == category_id);
                }
                Ok::<_, RpcError>(items)
            },
        )
        .query(
            "product.list",
            |state: AppState, input: ProductFilter| async move {
                let mut items = list::<Product>(&state).await?;
                if let Some(subcategory_id) = &input.subcategory_id {
                    items.retain(|p| &p.subcategory.id == subcategory_id);
                }
                Ok::<_, RpcError>(items)
            },
        )
        .query("banner.list", |state: AppState, _: NoInput| async move {
            list::<Banner>(&state).await
        })
        .query("gridItem.list", |state: AppState, _: NoInput| async move {
            list::<GridItem>(&state).await
        })
        .query("color.list", |state: AppState, _: NoInput| async move {
            list::<Color>(&state).await
        })
        .query("size.list", |state: AppState, _: NoInput| async move {
            list::<Size>(&state).await
        });

    let registry = crud!(registry, "category", Category, CategoryInput, create_category, update_category, delete_category);
    let registry = crud!(registry, "subcategory", Subcategory, SubcategoryInput, create_subcategory, update_subcategory, delete_subcategory);
    let registry = crud!(registry, "product", Product, ProductInput, create_product, update_product, delete_product);
    let registry = crud!(registry, "banner", Banner, BannerInput, create_banner, update_banner, delete_banner);
    let registry = crud!(registry, "gridItem", GridItem, GridItemInput, create_grid_item, update_grid_item, delete_grid_item);
    let registry = crud!(registry, "color", Color, ColorInput, create_color, update_color, delete_color);
    let registry = crud!(registry, "size", Size, SizeInput, create_size, update_size, delete_size);

    registry
        .query(
            "order.list",
            |state: AppState, input: OrderListQuery| async move {
                Ok::<_, RpcError>(OrderService::new(state.pool()).list(&input).await?)
            },
        )
        .query(
            "order.byId",
            |state: AppState, input: OrderIdInput| async move {
                Ok::<_, RpcError>(OrderService::new(state.pool()).get(input.id).await?)
            },
        )
        .mutation(
            "order.updateStatus",
            |state: AppState, input: StatusUpdate| async move {
                Ok::<_, RpcError>(OrderService::new(state.pool())
                    .update_status(input.id, input.status)
                    .await?)
            },
        )
}

async fn list<D: crate::cms::CatalogDocument>(state: &AppState) -> Result<Vec<D>, RpcError> {
    Ok(CatalogService::new(state.cms()).list::<D>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::ProcedureKind;

    #[test]
    fn test_every_router_is_registered() {
        let registry = registry();
        for prefix in ["category", "subcategory", "product", "banner", "gridItem", "color", "size"] {
            for (suffix, kind) in [
                ("list", ProcedureKind::Query),
                ("byId", ProcedureKind::Query),
                ("create", ProcedureKind::Mutation),
                ("update", ProcedureKind::Mutation),
                ("delete", ProcedureKind::Mutation),
            ] {
                let name = format!("{prefix}.{suffix}");
                let procedure = registry.get(&name);
                assert!(procedure.is_some(), "missing {name}");
                assert_eq!(procedure.map(|p| p.kind), Some(kind), "{name}");
            }
        }
        assert!(registry.get("order.list").is_some());
        assert!(registry.get("order.byId").is_some());
        assert_eq!(
            registry.get("order.updateStatus").map(|p| p.kind),
            Some(ProcedureKind::Mutation)
        );
        assert_eq!(registry.names().len(), 7 * 5 + 3);
    }
}
