//! Remote service gateway
//!
//! The one seam between the client and the network. Every endpoint is
//! expressed as an [`ApiRequest`] handed to a [`Gateway`]; the gateway does
//! not retry, and transport errors surface unchanged.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::error::{ClientError, Result};

/// Path prefix of the GitLab REST API
pub const API_PREFIX: &str = "/api/v4";

/// Header carrying the total number of pages of a listing
pub const TOTAL_PAGES_HEADER: &str = "x-total-pages";

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// A request relative to the API root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path plus query string, starting with `/`
    pub path: String,
    pub body: Option<String>,
    /// Headers added on top of the authentication headers
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A fully read response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
    /// Header names are lower-cased
    pub headers: HashMap<String, String>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    pub fn json_body(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Number of pages announced by the service; 1 when absent or garbled
    pub fn total_pages(&self) -> u32 {
        self.header(TOTAL_PAGES_HEADER)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(1)
    }

    /// Decodes the body, keeping the status code on failure
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| ClientError::parse_error(self.status, e.to_string()))
    }
}

/// Issues authenticated requests to the build service
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn request(&self, req: ApiRequest) -> Result<ApiResponse>;
}

/// reqwest-backed gateway
#[derive(Debug, Clone)]
pub struct HttpGateway {
    /// API root, e.g. "https://gitlab.example.com/api/v4"
    base_url: String,
    token: String,
    client: Client,
}

impl HttpGateway {
    /// Create a gateway for a GitLab instance
    ///
    /// `base_url` may be the instance root or already point at `/api/v4`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(base_url, token, Client::new())
    }

    /// Create a gateway whose requests give up after `timeout`
    pub fn with_timeout(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, token, client))
    }

    pub fn with_client(base_url: impl Into<String>, token: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: api_root(&base_url.into()),
            token: token.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn api_root(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.ends_with(API_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, API_PREFIX)
    }
}

impl HttpGateway {
    /// Turns an [`ApiRequest`] into the reqwest request sent on the wire
    ///
    /// The token and `Accept` headers are always set; caller headers are
    /// appended after them.
    fn build(&self, req: ApiRequest) -> Result<reqwest::Request> {
        let url = if req.path.starts_with('/') {
            format!("{}{}", self.base_url, req.path)
        } else {
            format!("{}/{}", self.base_url, req.path)
        };

        let mut builder = self
            .client
            .request(req.method, &url)
            .header(TOKEN_HEADER, self.token.as_str())
            .header(ACCEPT, "application/json");
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        Ok(builder.build()?)
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn request(&self, req: ApiRequest) -> Result<ApiResponse> {
        let request = self.build(req)?;
        debug!(method = %request.method(), url = %request.url(), "GitLab request");

        let response = self.client.execute(request).await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        debug!(status, "GitLab response");
        Ok(ApiResponse {
            status,
            body,
            headers,
        })
    }
}
