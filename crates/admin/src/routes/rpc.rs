//! RPC transport: `GET` for queries, `POST` for mutations.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::rpc::{ProcedureKind, RpcError, RpcSuccess};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RpcQuery {
    /// JSON-encoded procedure input.
    pub input: Option<String>,
}

type RpcResult = Result<Json<RpcSuccess<Value>>, RpcError>;

/// `GET /rpc/{name}?input=<json>`
#[instrument(skip_all, fields(procedure = %name))]
pub async fn query(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<RpcQuery>,
) -> RpcResult {
    let input = params.input.as_deref().unwrap_or_default();
    dispatch(state, &name, ProcedureKind::Query, input.as_bytes()).await
}

/// `POST /rpc/{name}` with a JSON body.
#[instrument(skip_all, fields(procedure = %name))]
pub async fn mutation(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> RpcResult {
    dispatch(state, &name, ProcedureKind::Mutation, &body).await
}

/// Any other method on `/rpc/{name}`.
pub async fn method_not_supported(Path(name): Path<String>) -> RpcError {
    RpcError::MethodNotSupported(format!("{name} must be called with GET or POST"))
}

async fn dispatch(state: AppState, name: &str, kind: ProcedureKind, raw: &[u8]) -> RpcResult {
    let procedure = state
        .procedures()
        .get(name)
        .cloned()
        .ok_or_else(|| RpcError::NotFound(format!("no procedure named {name}")))?;

    if procedure.kind != kind {
        return Err(RpcError::MethodNotSupported(format!(
            "{name} must be called with {}",
            procedure.kind.method()
        )));
    }

    let input = parse_json(raw)?;
    let data = procedure.call(state, input).await?;
    Ok(Json(RpcSuccess::new(data)))
}

/// Empty input reads as `null`.
fn parse_json(raw: &[u8]) -> Result<Value, RpcError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(raw).map_err(|e| RpcError::Parse(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json_empty_is_null() {
        assert_eq!(parse_json(b"").unwrap(), Value::Null);
        assert_eq!(parse_json(b"  \n").unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_json_object() {
        assert_eq!(parse_json(br#"{"id":"c1"}"#).unwrap(), json!({ "id": "c1" }));
    }

    #[test]
    fn test_parse_json_rejects_garbage() {
        let err = parse_json(b"{id:").unwrap_err();
        assert_eq!(err.code(), "PARSE_ERROR");
    }
}
