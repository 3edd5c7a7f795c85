//! HTTP transport used for PDP and token calls.
//!
//! The library never talks to the network directly; it goes through an
//! [`HttpDoer`] so that hosts can inject their own client and tests can
//! script responses.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{header::HeaderMap, HeaderValue, Method, StatusCode};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::{PepError, PepResult};

/// An outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Create a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Add a header. Values that are not valid header text are rejected.
    pub fn with_header(mut self, name: &'static str, value: &str) -> PepResult<Self> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| PepError::invalid_input(format!("invalid value for header {name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Set the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Get a header as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A received HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Create a response with an empty header map.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Check if the response indicates success.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get a header as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get the response body as a string, lossily.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Get the response body as JSON.
    pub fn body_json<T: DeserializeOwned>(&self) -> PepResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| PepError::internal(format!("failed to parse response body: {e}")))
    }
}

/// Executes HTTP requests.
///
/// Implementations report connection failures and timeouts as
/// [`PepError::transport`]; any received response, whatever its status, is
/// returned as `Ok`.
#[async_trait]
pub trait HttpDoer: Send + Sync + fmt::Debug {
    /// Execute a request.
    async fn execute(&self, request: HttpRequest) -> PepResult<HttpResponse>;
}

/// [`HttpDoer`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestDoer {
    client: Client,
}

impl ReqwestDoer {
    /// Create a doer with the given per-request timeout.
    pub fn new(timeout: Duration) -> PepResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(100)
            .build()
            .map_err(|e| PepError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpDoer for ReqwestDoer {
    async fn execute(&self, request: HttpRequest) -> PepResult<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| PepError::transport(format!("request to {} failed: {e}", request.url)))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| PepError::transport(format!("failed to read body: {e}")))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
