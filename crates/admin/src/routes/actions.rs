//! Form actions for the catalog editor.
//!
//! Each action takes a form-encoded body and answers with an
//! [`ActionState`] the front-end renders next to the form. Field names are
//! the camelCase names used by the RPC inputs; images are flattened into
//! `imageUrl` and `imageAlt`.

use std::collections::HashMap;
use std::fmt;

use axum::{
    Form, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::instrument;

use threadline_core::cms::Document;
use threadline_core::validation::FieldErrors;

use crate::services::catalog::{
    BannerInput, CategoryInput, ColorInput, Deleted, ImageInput, SizeInput, SubcategoryInput,
};
use crate::services::{CatalogError, CatalogService};
use crate::state::AppState;

/// Result of a form action.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionState {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
}

impl ActionState {
    fn success(id: impl Into<String>, message: String) -> Self {
        Self {
            ok: true,
            id: Some(id.into()),
            message: Some(message),
            field_errors: None,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id: None,
            message: Some(message.into()),
            field_errors: None,
        }
    }

    fn invalid(errors: FieldErrors) -> Self {
        Self {
            ok: false,
            id: None,
            message: Some("Please correct the highlighted fields".to_string()),
            field_errors: Some(form_paths(errors)),
        }
    }
}

/// Catalog collections editable through form actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Categories,
    Subcategories,
    Banners,
    Colors,
    Sizes,
}

impl Resource {
    /// Parse the `{resource}` path segment.
    #[must_use]
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "categories" => Some(Self::Categories),
            "subcategories" => Some(Self::Subcategories),
            "banners" => Some(Self::Banners),
            "colors" => Some(Self::Colors),
            "sizes" => Some(Self::Sizes),
            _ => None,
        }
    }

    const fn singular(self) -> &'static str {
        match self {
            Self::Categories => "Category",
            Self::Subcategories => "Subcategory",
            Self::Banners => "Banner",
            Self::Colors => "Color",
            Self::Sizes => "Size",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

/// An action's outcome with its status code.
#[derive(Debug)]
pub struct ActionResponse {
    status: StatusCode,
    state: ActionState,
}

impl ActionResponse {
    const fn new(status: StatusCode, state: ActionState) -> Self {
        Self { status, state }
    }

    fn unknown_resource(segment: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            ActionState::failure(format!("unknown resource {segment}")),
        )
    }
}

impl IntoResponse for ActionResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.state)).into_response()
    }
}

impl From<CatalogError> for ActionResponse {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(errors) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, ActionState::invalid(errors))
            }
            CatalogError::NotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, ActionState::failure(err.to_string()))
            }
            CatalogError::Conflict(message) => {
                Self::new(StatusCode::CONFLICT, ActionState::failure(message))
            }
            CatalogError::Cms(ref e) => {
                let event_id = sentry::capture_error(e);
                tracing::error!(error = %e, sentry_event_id = %event_id, "Form action failed");
                Self::new(
                    StatusCode::BAD_GATEWAY,
                    ActionState::failure("The content service is unavailable, try again"),
                )
            }
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /actions/{resource}`
#[instrument(skip_all, fields(resource = %resource))]
pub async fn create(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> ActionResponse {
    let Some(resource) = Resource::from_segment(&resource) else {
        return ActionResponse::unknown_resource(&resource);
    };
    let service = CatalogService::new(state.cms());
    let fields = FormFields::new(form);

    let result = match resource {
        Resource::Categories => written(service.create_category(category_input(&fields)).await),
        Resource::Subcategories => {
            written(service.create_subcategory(subcategory_input(&fields)).await)
        }
        Resource::Banners => match banner_input(&fields) {
            Ok(input) => written(service.create_banner(input).await),
            Err(errors) => Err(errors.into()),
        },
        Resource::Colors => written(service.create_color(color_input(&fields)).await),
        Resource::Sizes => match size_input(&fields) {
            Ok(input) => written(service.create_size(input).await),
            Err(errors) => Err(errors.into()),
        },
    };

    match result {
        Ok(id) => ActionResponse::new(
            StatusCode::CREATED,
            ActionState::success(id, format!("{resource} created")),
        ),
        Err(e) => e.into(),
    }
}

/// `POST /actions/{resource}/{id}`
#[instrument(skip_all, fields(resource = %resource, id = %id))]
pub async fn update(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Form(form): Form<HashMap<String, String>>,
) -> ActionResponse {
    let Some(resource) = Resource::from_segment(&resource) else {
        return ActionResponse::unknown_resource(&resource);
    };
    let service = CatalogService::new(state.cms());
    let fields = FormFields::new(form);

    let result = match resource {
        Resource::Categories => {
            written(service.update_category(&id, category_input(&fields)).await)
        }
        Resource::Subcategories => {
            written(service.update_subcategory(&id, subcategory_input(&fields)).await)
        }
        Resource::Banners => match banner_input(&fields) {
            Ok(input) => written(service.update_banner(&id, input).await),
            Err(errors) => Err(errors.into()),
        },
        Resource::Colors => written(service.update_color(&id, color_input(&fields)).await),
        Resource::Sizes => match size_input(&fields) {
            Ok(input) => written(service.update_size(&id, input).await),
            Err(errors) => Err(errors.into()),
        },
    };

    match result {
        Ok(id) => ActionResponse::new(
            StatusCode::OK,
            ActionState::success(id, format!("{resource} saved")),
        ),
        Err(e) => e.into(),
    }
}

/// `POST /actions/{resource}/{id}/delete`
#[instrument(skip_all, fields(resource = %resource, id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> ActionResponse {
    let Some(resource) = Resource::from_segment(&resource) else {
        return ActionResponse::unknown_resource(&resource);
    };
    let service = CatalogService::new(state.cms());

    let result: Result<Deleted, CatalogError> = match resource {
        Resource::Categories => service.delete_category(&id).await,
        Resource::Subcategories => service.delete_subcategory(&id).await,
        Resource::Banners => service.delete_banner(&id).await,
        Resource::Colors => service.delete_color(&id).await,
        Resource::Sizes => service.delete_size(&id).await,
    };

    match result {
        Ok(deleted) => ActionResponse::new(
            StatusCode::OK,
            ActionState::success(deleted.id, format!("{resource} deleted")),
        ),
        Err(e) => e.into(),
    }
}

fn written<D: Document>(result: Result<D, CatalogError>) -> Result<String, CatalogError> {
    result.map(|doc| doc.id().to_string())
}

// =============================================================================
// Form parsing
// =============================================================================

/// Raw form values with HTML form conventions applied.
#[derive(Debug, Default)]
struct FormFields(HashMap<String, String>);

impl FormFields {
    const fn new(values: HashMap<String, String>) -> Self {
        Self(values)
    }

    /// Trimmed value; blank fields read as absent.
    fn text(&self, name: &str) -> Option<String> {
        self.0
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Required text; a missing field reads as empty so validation reports it.
    fn required(&self, name: &str) -> String {
        self.text(name).unwrap_or_default()
    }

    /// Unchecked checkboxes are not submitted at all.
    fn checkbox(&self, name: &str) -> bool {
        self.0
            .get(name)
            .is_some_and(|v| matches!(v.trim(), "on" | "true" | "1" | "yes"))
    }

    /// Whole number; blank reads as zero.
    fn integer(&self, name: &str, errors: &mut FieldErrors) -> i32 {
        match self.text(name) {
            None => 0,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                errors.add(name, "must be a whole number");
                0
            }),
        }
    }

    /// `imageUrl` and `imageAlt` as an image, when a URL was given.
    fn image(&self) -> Option<ImageInput> {
        self.text("imageUrl").map(|url| ImageInput {
            url,
            alt: self.text("imageAlt"),
        })
    }
}

fn category_input(fields: &FormFields) -> CategoryInput {
    CategoryInput {
        name: fields.required("name"),
        slug: fields.text("slug"),
        description: fields.text("description"),
        image: fields.image(),
    }
}

fn subcategory_input(fields: &FormFields) -> SubcategoryInput {
    SubcategoryInput {
        name: fields.required("name"),
        slug: fields.text("slug"),
        category_id: fields.required("categoryId"),
        description: fields.text("description"),
        image: fields.image(),
    }
}

fn banner_input(fields: &FormFields) -> Result<BannerInput, FieldErrors> {
    let mut errors = FieldErrors::new();
    let sort_order = fields.integer("sortOrder", &mut errors);
    let Some(image) = fields.image() else {
        errors.add("imageUrl", "is required");
        return Err(errors);
    };
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(BannerInput {
        title: fields.required("title"),
        subtitle: fields.text("subtitle"),
        image,
        link_url: fields.text("linkUrl"),
        sort_order,
        active: fields.checkbox("active"),
    })
}

fn color_input(fields: &FormFields) -> ColorInput {
    ColorInput {
        name: fields.required("name"),
        hex: fields.required("hex").to_ascii_lowercase(),
    }
}

fn size_input(fields: &FormFields) -> Result<SizeInput, FieldErrors> {
    let mut errors = FieldErrors::new();
    let sort_order = fields.integer("sortOrder", &mut errors);
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(SizeInput {
        name: fields.required("name"),
        sort_order,
    })
}

/// Map nested image paths onto the flattened form field names.
fn form_paths(errors: FieldErrors) -> FieldErrors {
    let mut mapped = FieldErrors::new();
    for (path, messages) in errors.iter() {
        let field = match path.as_str() {
            "image.url" => "imageUrl",
            "image.alt" => "imageAlt",
            other => other,
        };
        for message in messages {
            mapped.add(field, message.clone());
        }
    }
    mapped
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(pairs: &[(&str, &str)]) -> FormFields {
        FormFields::new(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_resource_segments() {
        assert_eq!(Resource::from_segment("colors"), Some(Resource::Colors));
        assert_eq!(
            Resource::from_segment("subcategories"),
            Some(Resource::Subcategories)
        );
        assert_eq!(Resource::from_segment("products"), None);
        assert_eq!(Resource::Banners.to_string(), "Banner");
    }

    #[test]
    fn test_blank_fields_read_as_absent() {
        let input = category_input(&form(&[("name", " Shirts "), ("slug", "  "), ("imageUrl", "")]));
        assert_eq!(input.name, "Shirts");
        assert_eq!(input.slug, None);
        assert!(input.image.is_none());
    }

    #[test]
    fn test_checkbox_conventions() {
        let fields = form(&[("active", "on"), ("featured", "off")]);
        assert!(fields.checkbox("active"));
        assert!(!fields.checkbox("featured"));
        assert!(!fields.checkbox("missing"));
    }

    #[test]
    fn test_banner_requires_image_and_numeric_order() {
        let errors = banner_input(&form(&[("title", "Sale"), ("sortOrder", "first")])).unwrap_err();
        assert!(errors.get("imageUrl").is_some());
        assert!(errors.get("sortOrder").is_some());
    }

    #[test]
    fn test_banner_input_from_form() {
        let input = banner_input(&form(&[
            ("title", "Summer"),
            ("imageUrl", "https://cdn.example.com/summer.jpg"),
            ("imageAlt", "Beach"),
            ("sortOrder", "2"),
        ]))
        .unwrap();
        assert_eq!(input.sort_order, 2);
        assert!(!input.active);
        assert_eq!(input.image.alt.as_deref(), Some("Beach"));
    }

    #[test]
    fn test_size_blank_order_is_zero() {
        let input = size_input(&form(&[("name", "M"), ("sortOrder", "")])).unwrap();
        assert_eq!(input.sort_order, 0);
    }

    #[test]
    fn test_color_hex_lowercased() {
        assert_eq!(color_input(&form(&[("hex", "#FFAA00")])).hex, "#ffaa00");
    }

    #[test]
    fn test_validation_maps_to_422_with_form_paths() {
        let errors = FieldErrors::new()
            .with("image.url", "must be a valid URL")
            .with("name", "is required");
        let response = ActionResponse::from(CatalogError::Validation(errors));
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        let body = serde_json::to_value(&response.state).unwrap();
        assert_eq!(body["ok"], json!(false));
        assert_eq!(body["fieldErrors"]["imageUrl"], json!(["must be a valid URL"]));
        assert_eq!(body["fieldErrors"]["name"], json!(["is required"]));
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let response =
            ActionResponse::from(CatalogError::Conflict("color is used by 3 products".into()));
        assert_eq!(response.status, StatusCode::CONFLICT);
        assert_eq!(
            response.state.message.as_deref(),
            Some("color is used by 3 products")
        );
    }

    #[test]
    fn test_success_state_shape() {
        let state = ActionState::success("c1", "Category created".into());
        assert_eq!(
            serde_json::to_value(state).unwrap(),
            json!({ "ok": true, "id": "c1", "message": "Category created" })
        );
    }
}
