//! Read-only client for the headless CMS.
//!
//! # Architecture
//!
//! - GraphQL over HTTP with `graphql_client` request/response envelopes
//! - The CMS is the source of truth for catalog content, nothing is synced
//! - In-memory caching via `moka` for catalog reads (5 minute TTL)
//! - Checkout price lookups bypass the cache
//!
//! # Example
//!
//! ```rust,ignore
//! use threadline_storefront::cms::CmsClient;
//!
//! let cms = CmsClient::new(&config.cms);
//! let product = cms.product_by_slug("linen-shirt").await?;
//! ```

mod cache;
mod client;
pub mod queries;

pub use client::CmsClient;

use thiserror::Error;

/// Errors that can occur when reading from the CMS.
#[derive(Debug, Error)]
pub enum CmsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Document not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the CMS.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

/// A GraphQL error returned by the CMS.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Path to the error in the response.
    pub path: Vec<String>,
}

impl From<graphql_client::Error> for GraphQLError {
    fn from(error: graphql_client::Error) -> Self {
        Self {
            message: error.message,
            path: error
                .path
                .unwrap_or_default()
                .into_iter()
                .map(|fragment| match fragment {
                    graphql_client::PathFragment::Key(key) => key,
                    graphql_client::PathFragment::Index(i) => i.to_string(),
                })
                .collect(),
        }
    }
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut parts = Vec::new();
            if !e.message.is_empty() {
                parts.push(e.message.clone());
            }
            if !e.path.is_empty() {
                parts.push(format!("path: {}", e.path.join(".")));
            }
            if parts.is_empty() {
                format!("[error {}]: (no details)", i + 1)
            } else {
                parts.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cms_error_display() {
        let err = CmsError::NotFound("product linen-shirt".to_string());
        assert_eq!(err.to_string(), "Not found: product linen-shirt");
    }

    #[test]
    fn test_graphql_error_formatting() {
        let err = CmsError::GraphQL(vec![
            GraphQLError {
                message: "Unknown field".to_string(),
                path: vec![],
            },
            GraphQLError {
                message: String::new(),
                path: vec!["items".to_string(), "0".to_string()],
            },
            GraphQLError {
                message: String::new(),
                path: vec![],
            },
        ]);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: Unknown field; path: items.0; [error 3]: (no details)"
        );
    }

    #[test]
    fn test_graphql_error_empty_vec() {
        let err = CmsError::GraphQL(vec![]);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: (no error details provided)"
        );
    }

    #[test]
    fn test_graphql_error_from_client_error() {
        let error: graphql_client::Error = serde_json::from_value(serde_json::json!({
            "message": "boom",
            "path": ["items", 2, "slug"]
        }))
        .unwrap();
        let converted = GraphQLError::from(error);
        assert_eq!(converted.message, "boom");
        assert_eq!(converted.path, vec!["items", "2", "slug"]);
    }
}
