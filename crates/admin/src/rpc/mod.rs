//! Typed RPC procedures for the back-office front-end.
//!
//! Procedures are registered by dotted name (`category.list`,
//! `order.updateStatus`). Each one declares its input type, which is
//! deserialized and validated before the handler runs, and an output type
//! that is serialized into the success envelope:
//!
//! ```json
//! { "result": { "data": { "_id": "cat-1", "name": "Shirts" } } }
//! { "error": { "code": "CONFLICT", "message": "category still has 2 subcategories" } }
//! ```
//!
//! Queries are called with `GET /rpc/{name}?input=<json>`, mutations with
//! `POST /rpc/{name}` and a JSON body.

mod error;
mod procedures;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use validator::Validate;

pub use error::{RpcError, RpcErrorBody, RpcErrorShape};
pub use procedures::registry;

use crate::state::AppState;

/// Boxed future returned by a type-erased procedure.
pub type ProcedureFuture = Pin<Box<dyn Future<Output = Result<Value, RpcError>> + Send>>;

/// A type-erased procedure handler.
pub type ProcedureHandler = Arc<dyn Fn(AppState, Value) -> ProcedureFuture + Send + Sync>;

/// Whether a procedure reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcedureKind {
    /// Called with `GET`.
    Query,
    /// Called with `POST`.
    Mutation,
}

impl ProcedureKind {
    #[must_use]
    pub const fn method(self) -> &'static str {
        match self {
            Self::Query => "GET",
            Self::Mutation => "POST",
        }
    }
}

/// A registered procedure.
#[derive(Clone)]
pub struct Procedure {
    pub kind: ProcedureKind,
    handler: ProcedureHandler,
}

impl Procedure {
    /// Run the procedure with raw JSON input.
    ///
    /// # Errors
    ///
    /// Returns `RpcError` if the input does not parse or validate, or if the
    /// handler fails.
    pub async fn call(&self, state: AppState, input: Value) -> Result<Value, RpcError> {
        (self.handler)(state, input).await
    }
}

impl std::fmt::Debug for Procedure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Procedure").field("kind", &self.kind).finish_non_exhaustive()
    }
}

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct RpcSuccess<T> {
    pub result: RpcData<T>,
}

#[derive(Debug, Serialize)]
pub struct RpcData<T> {
    pub data: T,
}

impl<T> RpcSuccess<T> {
    pub const fn new(data: T) -> Self {
        Self {
            result: RpcData { data },
        }
    }
}

/// Procedures by name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    procedures: HashMap<&'static str, Procedure>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a query procedure.
    #[must_use]
    pub fn query<I, O, F, Fut>(self, name: &'static str, handler: F) -> Self
    where
        I: DeserializeOwned + Validate + Send + 'static,
        O: Serialize + 'static,
        F: Fn(AppState, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RpcError>> + Send + 'static,
    {
        self.register(name, ProcedureKind::Query, handler)
    }

    /// Register a mutation procedure.
    #[must_use]
    pub fn mutation<I, O, F, Fut>(self, name: &'static str, handler: F) -> Self
    where
        I: DeserializeOwned + Validate + Send + 'static,
        O: Serialize + 'static,
        F: Fn(AppState, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RpcError>> + Send + 'static,
    {
        self.register(name, ProcedureKind::Mutation, handler)
    }

    fn register<I, O, F, Fut>(mut self, name: &'static str, kind: ProcedureKind, handler: F) -> Self
    where
        I: DeserializeOwned + Validate + Send + 'static,
        O: Serialize + 'static,
        F: Fn(AppState, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RpcError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: ProcedureHandler = Arc::new(move |state: AppState, raw: Value| -> ProcedureFuture {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let input = parse_input::<I>(raw)?;
                let output = handler(state, input).await?;
                serde_json::to_value(output).map_err(|e| RpcError::Internal(e.to_string()))
            })
        });

        debug_assert!(
            !self.procedures.contains_key(name),
            "procedure {name} registered twice"
        );
        self.procedures.insert(
            name,
            Procedure {
                kind,
                handler: erased,
            },
        );
        self
    }

    /// Look up a procedure by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Procedure> {
        self.procedures.get(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.procedures.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Deserialize and validate procedure input. Missing input reads as `{}`.
fn parse_input<I>(raw: Value) -> Result<I, RpcError>
where
    I: DeserializeOwned + Validate,
{
    let raw = if raw.is_null() {
        Value::Object(Map::new())
    } else {
        raw
    };
    let input: I = serde_json::from_value(raw).map_err(|e| RpcError::BadRequest(e.to_string()))?;
    input.validate()?;
    Ok(input)
}

/// Input of procedures that take none.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize, Validate)]
pub struct NoInput {}

/// Input of procedures addressing one document.
#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct IdInput {
    #[validate(length(min = 1, max = 128))]
    pub id: String,
}

/// Input of update procedures: the id plus the full editable fields.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct UpdateInput<T> {
    pub id: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Validate for UpdateInput<T> {
    /// Only the id is checked here; the service validates `data` so the
    /// field paths stay flat.
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        let mut errors = validator::ValidationErrors::new();
        if self.id.trim().is_empty() {
            errors.add("id", validator::ValidationError::new("required"));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_input_defaults_missing_to_empty_object() {
        assert!(parse_input::<NoInput>(Value::Null).is_ok());
    }

    #[test]
    fn test_parse_input_reports_shape_errors() {
        let err = parse_input::<IdInput>(json!({ "slug": "x" })).unwrap_err();
        assert!(matches!(err, RpcError::BadRequest(_)));
    }

    #[test]
    fn test_parse_input_runs_validation() {
        let err = parse_input::<IdInput>(json!({ "id": "" })).unwrap_err();
        let RpcError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.get("id").is_some());
    }

    #[test]
    fn test_update_input_flattens_fields() {
        #[derive(Debug, serde::Deserialize)]
        struct Fields {
            name: String,
        }
        let input: UpdateInput<Fields> =
            serde_json::from_value(json!({ "id": "c1", "name": "Shirts" })).unwrap();
        assert_eq!(input.id, "c1");
        assert_eq!(input.data.name, "Shirts");
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_success_envelope() {
        let value = serde_json::to_value(RpcSuccess::new(json!({ "id": 1 }))).unwrap();
        assert_eq!(value, json!({ "result": { "data": { "id": 1 } } }));
    }
}
