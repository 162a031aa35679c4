use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::engine::{MockEngine, MockRequest, MockResponse};

/// Request bodies are collected before reaching the engine; anything larger gets 413.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub const NO_HANDLER_BODY: &str = "no OpenAPI handler available";
pub const FAULT_BODY: &str = "internal server error";

/// Wraps the engine so that a failing request becomes a 500 and nothing more.
#[derive(Clone)]
pub struct Recovery {
    engine: Option<Arc<dyn MockEngine>>,
}

impl std::fmt::Debug for Recovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recovery")
            .field("has_engine", &self.engine.is_some())
            .finish()
    }
}

impl Recovery {
    pub fn new(engine: Option<Arc<dyn MockEngine>>) -> Self {
        Self { engine }
    }

    pub async fn handle(&self, request: MockRequest) -> MockResponse {
        let Some(engine) = &self.engine else {
            return MockResponse::text(StatusCode::INTERNAL_SERVER_ERROR, NO_HANDLER_BODY);
        };

        let method = request.method.clone();
        let path = request.path.clone();
        match engine.serve(request).await {
            Ok(response) => response,
            Err(fault) => {
                let request_id = uuid::Uuid::new_v4().to_string();
                error!(%request_id, %method, %path, "recovered fault in handler: {fault}");
                let mut response =
                    MockResponse::text(StatusCode::INTERNAL_SERVER_ERROR, FAULT_BODY);
                if let Ok(value) = HeaderValue::from_str(&request_id) {
                    response.headers.insert("x-request-id", value);
                }
                response
            }
        }
    }
}

/// The HTTP application served by the listener: every request goes to the engine.
pub fn router(engine: Option<Arc<dyn MockEngine>>) -> Router {
    Router::new()
        .fallback(recover)
        .with_state(Recovery::new(engine))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

async fn recover(
    State(recovery): State<Recovery>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = MockRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    };
    recovery.handle(request).await.into_response()
}
