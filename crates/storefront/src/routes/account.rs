//! Account route handlers: profile and saved addresses.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use threadline_core::AddressId;

use crate::db::{AddressRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::RequireUser;
use crate::models::{Address, AddressInput, User};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(min = 5, max = 32))]
    pub phone: Option<String>,
}

// =============================================================================
// Profile
// =============================================================================

/// `GET /api/account/profile`
pub async fn profile(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<Json<User>> {
    UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("account".to_string()))
}

/// `PATCH /api/account/profile`
#[instrument(skip(state, update), fields(user_id = %current.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    ValidatedJson(update): ValidatedJson<ProfileUpdate>,
) -> Result<Json<User>> {
    let phone = update
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let user = UserRepository::new(state.pool())
        .update_profile(current.id, update.name.trim(), phone)
        .await?;
    Ok(Json(user))
}

// =============================================================================
// Addresses
// =============================================================================

/// `GET /api/account/addresses`
pub async fn list_addresses(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<Json<Vec<Address>>> {
    let addresses = AddressRepository::new(state.pool()).list(current.id).await?;
    Ok(Json(addresses))
}

/// `POST /api/account/addresses`
///
/// The first address a user saves becomes primary.
#[instrument(skip(state, input), fields(user_id = %current.id))]
pub async fn create_address(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    ValidatedJson(input): ValidatedJson<AddressInput>,
) -> Result<impl IntoResponse> {
    let address = AddressRepository::new(state.pool())
        .create(current.id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// `PATCH /api/account/addresses/{id}`
#[instrument(skip(state, input), fields(user_id = %current.id))]
pub async fn update_address(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<AddressId>,
    ValidatedJson(input): ValidatedJson<AddressInput>,
) -> Result<Json<Address>> {
    let address = AddressRepository::new(state.pool())
        .update(current.id, id, input)
        .await?;
    Ok(Json(address))
}

/// `POST /api/account/addresses/{id}/primary`
pub async fn set_primary_address(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>> {
    let address = AddressRepository::new(state.pool())
        .set_primary(current.id, id)
        .await?;
    Ok(Json(address))
}

/// `DELETE /api/account/addresses/{id}`
///
/// Deleting the primary address promotes the most recently updated one.
pub async fn delete_address(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    AddressRepository::new(state.pool())
        .delete(current.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_validation() {
        let update = ProfileUpdate {
            name: String::new(),
            phone: Some("12".to_string()),
        };
        let errors = threadline_core::validation::FieldErrors::from(update.validate().unwrap_err());
        assert!(errors.get("name").is_some());
        assert!(errors.get("phone").is_some());

        let update = ProfileUpdate {
            name: "Ada Lovelace".to_string(),
            phone: None,
        };
        assert!(update.validate().is_ok());
    }
}
