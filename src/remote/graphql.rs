use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::{is_secure_endpoint, read_limited_bytes, LimitedReadError};

/// Responses larger than this are rejected before decoding.
pub const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GraphQlError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("GraphQL error: {0}")]
    Server(String),
    #[error("GraphQL response carried no data")]
    MissingData,
    #[error("Insecure endpoint: HTTPS required (except localhost for testing)")]
    InsecureEndpoint,
}

#[derive(Serialize)]
struct RequestBody<'a, V> {
    query: &'a str,
    variables: V,
}

#[derive(Deserialize)]
struct ResponseEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    message: String,
}

/// Bearer-authenticated GraphQL client for one endpoint.
#[derive(Clone)]
pub struct GraphQlClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl GraphQlClient {
    pub fn new(http: reqwest::Client, endpoint: &str) -> Self {
        Self {
            http,
            endpoint: endpoint.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one query or mutation and decode its `data` member.
    ///
    /// Errors reported alongside data are logged and the data is returned;
    /// errors without data fail with [`GraphQlError::Server`].
    pub async fn request<V, T>(
        &self,
        token: &SecretString,
        query: &str,
        variables: V,
    ) -> Result<T, GraphQlError>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        // The bearer token must never travel over plain HTTP to a remote host.
        if !is_secure_endpoint(&self.endpoint) {
            tracing::error!(endpoint = %self.endpoint, "Rejecting non-HTTPS GraphQL endpoint");
            return Err(GraphQlError::InsecureEndpoint);
        }

        let body = serde_json::to_vec(&RequestBody { query, variables })?;
        let request = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            )
            .body(body);

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| GraphQlError::Timeout(self.timeout.as_secs()))?
            .map_err(GraphQlError::Network)?;

        if !response.status().is_success() {
            return Err(GraphQlError::HttpStatus(response.status().as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
        let envelope: ResponseEnvelope<T> = serde_json::from_slice(&bytes)?;

        if !envelope.errors.is_empty() {
            let messages: Vec<&str> = envelope.errors.iter().map(|e| e.message.as_str()).collect();
            tracing::warn!(endpoint = %self.endpoint, errors = ?messages, "GraphQL errors in response");
        }

        match envelope.data {
            Some(data) => Ok(data),
            None => match envelope.errors.into_iter().next() {
                Some(first) => Err(GraphQlError::Server(first.message)),
                None => Err(GraphQlError::MissingData),
            },
        }
    }
}

impl From<LimitedReadError> for GraphQlError {
    fn from(e: LimitedReadError) -> Self {
        match e {
            LimitedReadError::TooLarge(limit) => GraphQlError::ResponseTooLarge(limit),
            LimitedReadError::Network(e) => GraphQlError::Network(e),
        }
    }
}
