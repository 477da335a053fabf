//! Mutate API request and response types.
//!
//! A request carries a list of mutations that the CMS applies as one
//! transaction:
//!
//! ```json
//! { "mutations": [
//!     { "create": { "_type": "color", "name": "Sand", "hex": "#d8c9a7" } },
//!     { "patch": { "id": "color-1", "set": { "name": "Dune" }, "unset": ["hex"] } },
//!     { "delete": { "id": "color-2" } }
//! ] }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single document mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutation {
    /// Create a document; the CMS assigns `_id` when it is absent.
    Create(Value),
    /// Set and unset fields of an existing document.
    Patch(Patch),
    /// Delete a document by id.
    Delete { id: String },
}

impl Mutation {
    /// Create a document of type `kind` from its fields.
    ///
    /// Non-object `fields` produce a document with only `_type`.
    #[must_use]
    pub fn create(kind: &str, fields: Value) -> Self {
        let mut document = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        // Absent optional fields are left off the new document.
        document.retain(|_, value| !value.is_null());
        document.insert("_type".to_string(), Value::String(kind.to_string()));
        Self::Create(Value::Object(document))
    }

    #[must_use]
    pub fn delete(id: impl Into<String>) -> Self {
        Self::Delete { id: id.into() }
    }
}

/// Partial update of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Patch {
    pub id: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub set: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unset: Vec<String>,
}

impl Patch {
    /// Patch that sets every non-null field and unsets every null one.
    #[must_use]
    pub fn from_fields(id: impl Into<String>, fields: Value) -> Self {
        let mut patch = Self {
            id: id.into(),
            ..Self::default()
        };
        if let Value::Object(map) = fields {
            for (key, value) in map {
                if value.is_null() {
                    patch.unset.push(key);
                } else {
                    patch.set.insert(key, value);
                }
            }
        }
        patch
    }
}

#[derive(Debug, Serialize)]
pub(super) struct MutateRequest<'a> {
    pub mutations: &'a [Mutation],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MutateResponse {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub results: Vec<MutationResult>,
}

/// Outcome of one mutation in a transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct MutationResult {
    pub id: String,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub document: Option<Value>,
}

/// Error body returned by the mutate and asset APIs.
#[derive(Debug, Deserialize)]
pub(super) struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiErrorDetail {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl ApiErrorDetail {
    pub fn message(&self) -> String {
        self.description
            .clone()
            .or_else(|| self.kind.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let mutations = [
            Mutation::create("color", json!({ "name": "Sand", "hex": "#d8c9a7" })),
            Mutation::Patch(Patch::from_fields(
                "color-1",
                json!({ "name": "Dune", "hex": null }),
            )),
            Mutation::delete("color-2"),
        ];
        let value = serde_json::to_value(MutateRequest {
            mutations: &mutations,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({ "mutations": [
                { "create": { "_type": "color", "name": "Sand", "hex": "#d8c9a7" } },
                { "patch": { "id": "color-1", "set": { "name": "Dune" }, "unset": ["hex"] } },
                { "delete": { "id": "color-2" } }
            ] })
        );
    }

    #[test]
    fn test_create_drops_null_fields() {
        let Mutation::Create(document) =
            Mutation::create("category", json!({ "name": "Shirts", "image": null }))
        else {
            panic!("expected create");
        };
        assert_eq!(document, json!({ "_type": "category", "name": "Shirts" }));
    }

    #[test]
    fn test_empty_patch_sections_omitted() {
        let value = serde_json::to_value(Patch::from_fields("x", json!({}))).unwrap();
        assert_eq!(value, json!({ "id": "x" }));
    }

    #[test]
    fn test_response_parsing() {
        let response: MutateResponse = serde_json::from_value(json!({
            "transactionId": "tx-1",
            "results": [{ "id": "color-9", "operation": "create",
                          "document": { "_id": "color-9", "name": "Sand" } }]
        }))
        .unwrap();
        assert_eq!(response.transaction_id.as_deref(), Some("tx-1"));
        assert_eq!(response.results[0].id, "color-9");
    }

    #[test]
    fn test_error_body_message() {
        let body: ApiErrorBody = serde_json::from_value(json!({
            "error": { "type": "mutationError", "description": "Document by ID \"x\" not found" }
        }))
        .unwrap();
        assert_eq!(body.error.message(), "Document by ID \"x\" not found");
    }
}
