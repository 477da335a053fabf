//! Field-error maps for form and RPC validation failures.
//!
//! Both front-ends render errors next to the offending input, so nested
//! structs and lists are flattened into dotted paths such as
//! `variants[0].unitPrice`. Path segments are camelCase, matching the JSON
//! bodies the inputs were read from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

/// Messages per field path, in stable (sorted) order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Builder form of [`FieldErrors::add`].
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.add(field, message);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// First message of the first field, for one-line summaries.
    #[must_use]
    pub fn first_message(&self) -> Option<&str> {
        self.0.values().flatten().next().map(String::as_str)
    }
}

impl From<&ValidationErrors> for FieldErrors {
    fn from(errors: &ValidationErrors) -> Self {
        let mut out = Self::new();
        flatten(errors, "", &mut out);
        out
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        Self::from(&errors)
    }
}

fn flatten(errors: &ValidationErrors, prefix: &str, out: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        let field = camel_case(field);
        let path = if prefix.is_empty() {
            field
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    out.add(path.clone(), describe(error));
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten(inner, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for ch in field.chars() {
        if ch == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Human-readable text for a validation error.
///
/// Explicit messages win; otherwise a message is derived from the rule code
/// and its parameters.
#[must_use]
pub fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }

    let param = |name: &str| error.params.get(name).map(ToString::to_string);

    match error.code.as_ref() {
        "length" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("must be between {min} and {max} characters"),
            (Some(min), None) => format!("must be at least {min} characters"),
            (None, Some(max)) => format!("must be at most {max} characters"),
            (None, None) => "has an invalid length".to_string(),
        },
        "range" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("must be between {min} and {max}"),
            (Some(min), None) => format!("must be at least {min}"),
            (None, Some(max)) => format!("must be at most {max}"),
            (None, None) => "is out of range".to_string(),
        },
        "email" => "must be a valid email address".to_string(),
        "url" => "must be a valid URL".to_string(),
        "required" => "is required".to_string(),
        "must_match" => "does not match".to_string(),
        code => format!("is invalid ({code})"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Variant {
        #[validate(range(min = 0.0))]
        price: f64,
    }

    #[derive(Validate)]
    struct ProductInput {
        #[validate(length(min = 1, max = 10))]
        name: String,
        #[validate(email)]
        contact: String,
        #[validate(nested)]
        variants: Vec<Variant>,
    }

    #[test]
    fn test_flattens_fields_and_lists() {
        let input = ProductInput {
            name: String::new(),
            contact: "nope".to_string(),
            variants: vec![Variant { price: 1.0 }, Variant { price: -1.0 }],
        };
        let errors = FieldErrors::from(input.validate().unwrap_err());

        assert_eq!(
            errors.get("name").unwrap(),
            ["must be between 1 and 10 characters".to_string()]
        );
        assert_eq!(
            errors.get("contact").unwrap(),
            ["must be a valid email address".to_string()]
        );
        assert_eq!(
            errors.get("variants[1].price").unwrap(),
            ["must be at least 0.0".to_string()]
        );
        assert!(errors.get("variants[0].price").is_none());
    }

    #[test]
    fn test_paths_are_camel_case() {
        assert_eq!(camel_case("category_id"), "categoryId");
        assert_eq!(camel_case("link_url"), "linkUrl");
        assert_eq!(camel_case("name"), "name");
        assert_eq!(camel_case("_key"), "key");
    }

    #[test]
    fn test_explicit_message_wins() {
        let error = ValidationError::new("custom").with_message("pick one".into());
        assert_eq!(describe(&error), "pick one");
        assert_eq!(describe(&ValidationError::new("hex")), "is invalid (hex)");
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let errors = FieldErrors::new()
            .with("email", "is taken")
            .with("email", "is required");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({ "email": ["is taken", "is required"] }));
        assert_eq!(errors.first_message(), Some("is taken"));
    }
}
