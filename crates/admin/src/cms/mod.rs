//! Read/write client for the headless CMS.
//!
//! # Architecture
//!
//! - Reads go through GraphQL (`graphql_client` envelopes), uncached so
//!   editors always see their own writes
//! - Writes go through the transactional mutate API
//! - Images go to the asset store and come back as hosted URLs
//!
//! This module holds the write token. It only exists in the admin binary.

mod client;
pub mod mutations;
pub mod queries;

pub use client::{CmsClient, UploadedAsset};
pub use mutations::{Mutation, MutationResult, Patch};
pub use queries::CatalogDocument;

use thiserror::Error;

/// Errors that can occur when talking to the CMS.
#[derive(Debug, Error)]
pub enum CmsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// The mutate or asset API rejected the request.
    #[error("CMS rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by the CMS.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

/// A GraphQL error returned by the CMS.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    pub message: String,
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
        .map(|e| {
            if e.path.is_empty() {
                e.message.clone()
            } else {
                format!("{} (path: {})", e.message, e.path.join("."))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_error_formatting() {
        let err = CmsError::GraphQL(vec![
            GraphQLError {
                message: "Unknown type".to_string(),
                path: vec![],
            },
            GraphQLError {
                message: "Bad field".to_string(),
                path: vec!["items".to_string(), "3".to_string()],
            },
        ]);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: Unknown type; Bad field (path: items.3)"
        );
    }

    #[test]
    fn test_rejected_display() {
        let err = CmsError::Rejected {
            status: 409,
            message: "Document already exists".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "CMS rejected request (409): Document already exists"
        );
    }
}
