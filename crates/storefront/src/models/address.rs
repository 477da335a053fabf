//! Saved shipping addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use threadline_core::{AddressId, UserId};

/// A saved address row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    #[serde(skip)]
    pub user_id: UserId,
    pub label: Option<String>,
    pub recipient_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Address fields accepted from the client.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[validate(length(max = 64))]
    pub label: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub recipient_name: String,
    #[validate(length(min = 1, max = 256))]
    pub line1: String,
    #[validate(length(max = 256))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub city: String,
    #[validate(length(max = 128))]
    pub region: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub postal_code: String,
    /// ISO 3166-1 alpha-2.
    #[validate(length(equal = 2), custom(function = "validate_country"))]
    pub country: String,
    #[validate(length(min = 5, max = 32))]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

fn validate_country(country: &str) -> Result<(), validator::ValidationError> {
    if country.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("country")
            .with_message("must be a two-letter country code".into()))
    }
}

impl AddressInput {
    /// Upper-case the country code and drop blank optional fields.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.country = self.country.to_ascii_uppercase();
        self.label = blank_to_none(self.label);
        self.line2 = blank_to_none(self.line2);
        self.region = blank_to_none(self.region);
        self.phone = blank_to_none(self.phone);
        self
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Address copied onto an order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSnapshot {
    pub recipient_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

impl From<&Address> for AddressSnapshot {
    fn from(address: &Address) -> Self {
        Self {
            recipient_name: address.recipient_name.clone(),
            line1: address.line1.clone(),
            line2: address.line2.clone(),
            city: address.city.clone(),
            region: address.region.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
            phone: address.phone.clone(),
        }
    }
}

impl From<AddressInput> for AddressSnapshot {
    fn from(input: AddressInput) -> Self {
        let input = input.normalized();
        Self {
            recipient_name: input.recipient_name,
            line1: input.line1,
            line2: input.line2,
            city: input.city,
            region: input.region,
            postal_code: input.postal_code,
            country: input.country,
            phone: input.phone,
        }
    }
}
