//! The mock engine: turns an OpenAPI document into canned HTTP responses.
//!
//! The rest of the crate only talks to the [`MockEngine`] trait; the
//! [`OpenApiEngine`] is the one implementation.

pub mod example;
pub mod openapi;
pub mod routes;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::ServerError;

pub use openapi::OpenApiEngine;

/// A request handed to the engine with its body already collected.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl MockRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl MockResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            self.headers.insert(header::CONTENT_TYPE, value);
        }
        self.body = body.into();
        self
    }

    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        Self::new(status).with_body("application/json", body)
    }

    pub fn text(status: StatusCode, text: &str) -> Self {
        Self::new(status).with_body("text/plain; charset=utf-8", text.to_string())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

/// A failure while answering a single request.
///
/// Contained by the recovery middleware and turned into a 500; it never
/// affects other requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct RequestFault(String);

impl RequestFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// One pre-computed example, reported by [`MockEngine::response_examples`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseExample {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub content_type: Option<String>,
}

impl std::fmt::Debug for dyn MockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockEngine").finish()
    }
}

#[async_trait]
pub trait MockEngine: Send + Sync {
    /// Answer one request with the documented example for its operation.
    async fn serve(&self, request: MockRequest) -> Result<MockResponse, RequestFault>;

    /// Pre-compute the example response of every operation.
    ///
    /// Purely diagnostic: callers log a failure and keep serving.
    fn response_examples(&self) -> Result<Vec<ResponseExample>, ServerError>;

    /// Release the engine. Requests served afterwards are faults.
    async fn close(&self);
}
