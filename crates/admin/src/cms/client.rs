//! CMS client for GraphQL reads, mutations and asset uploads.

use std::sync::Arc;

use graphql_client::{GraphQLQuery, Response};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::mutations::{ApiErrorBody, MutateRequest, MutateResponse};
use super::queries::{CatalogDocument, IdVariables, NoVariables};
use super::{CmsError, GraphQLError, Mutation, MutationResult};
use crate::config::CmsConfig;

/// An image stored in the CMS asset store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAsset {
    #[serde(rename = "_id")]
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    document: UploadedAsset,
}

/// Client for the CMS APIs, authenticated with the write token.
#[derive(Clone)]
pub struct CmsClient {
    inner: Arc<CmsClientInner>,
}

struct CmsClientInner {
    client: reqwest::Client,
    graphql_endpoint: String,
    mutate_endpoint: String,
    upload_endpoint: String,
    read_token: String,
    write_token: String,
}

impl CmsClient {
    /// Create a new CMS client.
    #[must_use]
    pub fn new(config: &CmsConfig) -> Self {
        let write_token = config.write_token.expose_secret().to_string();
        let read_token = config
            .read_token
            .as_ref()
            .map_or_else(|| write_token.clone(), |t| t.expose_secret().to_string());

        Self {
            inner: Arc::new(CmsClientInner {
                client: reqwest::Client::new(),
                graphql_endpoint: config.graphql_endpoint(),
                mutate_endpoint: config.mutate_endpoint(),
                upload_endpoint: config.image_upload_endpoint(),
                read_token,
                write_token,
            }),
        }
    }

    /// Execute a GraphQL query.
    async fn execute<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, CmsError> {
        let request_body = Q::build_query(variables);

        let response = self
            .inner
            .client
            .post(&self.inner.graphql_endpoint)
            .bearer_auth(&self.inner.read_token)
            .json(&request_body)
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CmsError::RateLimited(retry_after(&response)));
        }

        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                operation = request_body.operation_name,
                body = %response_text.chars().take(500).collect::<String>(),
                "CMS returned non-success status"
            );
            return Err(CmsError::GraphQL(vec![GraphQLError {
                message: format!(
                    "HTTP {status}: {}",
                    response_text.chars().take(200).collect::<String>()
                ),
                path: vec![],
            }]));
        }

        let response: Response<Q::ResponseData> = serde_json::from_str(&response_text)
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    operation = request_body.operation_name,
                    "Failed to parse CMS GraphQL response"
                );
            })?;

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            debug!(errors = ?errors, "GraphQL errors in response");
            return Err(CmsError::GraphQL(
                errors.into_iter().map(GraphQLError::from).collect(),
            ));
        }

        response.data.ok_or_else(|| {
            CmsError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
                path: vec![],
            }])
        })
    }

    /// Every document of type `D`, including inactive ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the CMS request fails.
    #[instrument(skip(self), fields(kind = D::TYPE))]
    pub async fn list<D: CatalogDocument>(&self) -> Result<Vec<D>, CmsError> {
        Ok(self.execute::<D::List>(NoVariables {}).await?.items)
    }

    /// A document of type `D` by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the CMS request fails.
    #[instrument(skip(self), fields(kind = D::TYPE))]
    pub async fn get<D: CatalogDocument>(&self, id: &str) -> Result<Option<D>, CmsError> {
        let data = self
            .execute::<D::ById>(IdVariables { id: id.to_string() })
            .await?;
        Ok(data.items.into_iter().next())
    }

    /// Apply mutations as one transaction.
    ///
    /// # Errors
    ///
    /// Returns `CmsError::Rejected` if the CMS refuses the transaction, and
    /// an HTTP or parse error if the request fails.
    #[instrument(skip(self, mutations), fields(count = mutations.len()))]
    pub async fn mutate(&self, mutations: &[Mutation]) -> Result<Vec<MutationResult>, CmsError> {
        let response = self
            .inner
            .client
            .post(&self.inner.mutate_endpoint)
            .query(&[
                ("returnIds", "true"),
                ("returnDocuments", "true"),
                ("visibility", "sync"),
            ])
            .bearer_auth(&self.inner.write_token)
            .json(&MutateRequest { mutations })
            .send()
            .await?;

        let body = read_success(response).await?;
        let parsed: MutateResponse = serde_json::from_str(&body)?;
        debug!(transaction_id = ?parsed.transaction_id, "CMS transaction committed");
        Ok(parsed.results)
    }

    /// Upload an image to the asset store.
    ///
    /// # Errors
    ///
    /// Returns `CmsError::Rejected` if the asset store refuses the file.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        filename: Option<&str>,
    ) -> Result<UploadedAsset, CmsError> {
        let mut request = self
            .inner
            .client
            .post(&self.inner.upload_endpoint)
            .bearer_auth(&self.inner.write_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(name) = filename {
            request = request.query(&[("filename", name)]);
        }

        let body = read_success(request.send().await?).await?;
        let parsed: UploadResponse = serde_json::from_str(&body)?;
        Ok(parsed.document)
    }
}

fn retry_after(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(1)
}

/// Read a mutate/asset API response body, mapping failures to errors.
async fn read_success(response: reqwest::Response) -> Result<String, CmsError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(CmsError::RateLimited(retry_after(&response)));
    }

    let body = response.text().await?;
    if status.is_success() {
        return Ok(body);
    }

    let message = serde_json::from_str::<ApiErrorBody>(&body).map_or_else(
        |_| body.chars().take(200).collect(),
        |parsed| parsed.error.message(),
    );
    tracing::warn!(status = %status, message = %message, "CMS rejected request");
    Err(CmsError::Rejected {
        status: status.as_u16(),
        message,
    })
}
