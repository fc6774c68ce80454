// GitHub GraphQL HTTP client.
// Handles authentication and the GraphQL request/response envelope.

use reqwest::{
    Client, Response,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::error::{AppError, Result};

use super::types::QueryError;

/// Public GitHub GraphQL endpoint.
pub const GITHUB_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";

/// Single entry of a GraphQL `errors` array.
#[derive(Debug, Deserialize)]
pub struct GraphqlError {
    pub message: String,
}

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

impl<T> GraphqlResponse<T> {
    /// Split into the (possibly partial) data and the first error message.
    pub fn into_parts(self) -> (Option<T>, Option<String>) {
        let error = self.errors.into_iter().next().map(|e| e.message);
        (self.data, error)
    }
}

/// GitHub GraphQL client bound to one endpoint.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    endpoint: String,
}

impl GitHubClient {
    /// Create a client that authenticates with a personal access token.
    pub fn new(endpoint: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| AppError::InvalidToken(e.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("gitreleases"));

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self::with_client(endpoint, client))
    }

    /// Use an already configured transport.
    pub fn with_client(endpoint: &str, client: Client) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run a GraphQL query and decode its envelope.
    pub async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> std::result::Result<GraphqlResponse<T>, QueryError> {
        let body = json!({
            "query": query,
            "variables": variables,
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let response = Self::check_response(response).await?;

        let bytes = response.bytes().await?;
        let envelope = serde_json::from_slice(&bytes)?;
        Ok(envelope)
    }

    /// Reject non-success statuses, keeping the body for diagnostics.
    async fn check_response(response: Response) -> std::result::Result<Response, QueryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(QueryError::Status { status, body })
    }
}
