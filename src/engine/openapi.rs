use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::http::{header, HeaderValue, Method, StatusCode};
use openapiv3::{OpenAPI, Operation, PathItem, ReferenceOr, Response, Responses};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ServerError;

use super::example::ExampleGenerator;
use super::routes::{strip_base_path, RouteTable, RouteTemplate};
use super::{MockEngine, MockRequest, MockResponse, RequestFault, ResponseExample};

/// Mock engine backed by an OpenAPI 3.0 document.
pub struct OpenApiEngine {
    document: OpenAPI,
    routes: RouteTable,
    spec_path: PathBuf,
    bind_address: String,
    base_path: String,
    closed: AtomicBool,
}

impl std::fmt::Debug for OpenApiEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenApiEngine")
            .field("spec_path", &self.spec_path)
            .field("bind_address", &self.bind_address)
            .field("base_path", &self.base_path)
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

/// Parse a document as JSON when the file says so, YAML otherwise.
pub fn parse_document(path: &Path, text: &str) -> Result<OpenAPI, String> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(text).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }
}

impl OpenApiEngine {
    /// Read and parse the document at `spec_path`.
    pub fn load(spec_path: &Path, bind_address: &str, base_path: &str) -> Result<Self, ServerError> {
        let engine_error = |detail: String| ServerError::EngineError {
            path: spec_path.to_path_buf(),
            detail,
        };
        let text = std::fs::read_to_string(spec_path).map_err(|e| engine_error(e.to_string()))?;
        let document = parse_document(spec_path, &text).map_err(engine_error)?;
        Ok(Self::from_document(document, spec_path, bind_address, base_path))
    }

    pub fn from_document(
        document: OpenAPI,
        spec_path: impl Into<PathBuf>,
        bind_address: &str,
        base_path: &str,
    ) -> Self {
        let routes = RouteTable::new(document.paths.paths.keys().map(|p| RouteTemplate::parse(p)));
        let engine = Self {
            document,
            routes,
            spec_path: spec_path.into(),
            bind_address: bind_address.to_string(),
            base_path: base_path.to_string(),
            closed: AtomicBool::new(false),
        };
        debug!(
            spec = %engine.spec_path.display(),
            title = %engine.document.info.title,
            bind = %engine.bind_address,
            base_path = %engine.base_path,
            routes = engine.routes.len(),
            "loaded OpenAPI document"
        );
        engine
    }

    pub fn title(&self) -> &str {
        &self.document.info.title
    }

    fn path_item(&self, template: &str) -> Option<&PathItem> {
        match self.document.paths.paths.get(template)? {
            ReferenceOr::Item(item) => Some(item),
            ReferenceOr::Reference { .. } => None,
        }
    }

    fn respond(&self, request: &MockRequest) -> Result<MockResponse, RequestFault> {
        let Some(path) = strip_base_path(&request.path, &self.base_path) else {
            return Ok(not_found(&request.method, &request.path, None));
        };

        let accept = request
            .headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok());

        let mut allowed: Vec<String> = Vec::new();
        for template in self.routes.find_all(path) {
            let Some(item) = self.path_item(template.as_str()) else {
                continue;
            };
            if let Some(operation) = find_operation(item, &request.method) {
                debug!(
                    method = %request.method,
                    path = %request.path,
                    template = template.as_str(),
                    operation_id = operation.operation_id.as_deref().unwrap_or(""),
                    "matched operation"
                );
                return self.example_response(operation, accept);
            }
            for (method, _) in operations(item) {
                if !allowed.iter().any(|m| m == method) {
                    allowed.push(method.to_string());
                }
            }
        }

        if !allowed.is_empty() {
            let mut resp = MockResponse::json(
                StatusCode::METHOD_NOT_ALLOWED,
                &json!({ "error": format!("method {} not allowed for {}", request.method, request.path) }),
            );
            if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                resp.headers.insert(header::ALLOW, value);
            }
            return Ok(resp);
        }

        Ok(not_found(&request.method, &request.path, self.routes.closest(path)))
    }

    fn example_response(
        &self,
        operation: &Operation,
        accept: Option<&str>,
    ) -> Result<MockResponse, RequestFault> {
        let generator = ExampleGenerator::new(self.document.components.as_ref());
        let Some((status, response)) = select_response(&operation.responses) else {
            return Ok(MockResponse::new(StatusCode::OK));
        };
        let response = generator.response(response)?;
        let Some((content_type, media)) = select_media(response, accept) else {
            return Ok(MockResponse::new(status));
        };
        match generator.media_example(media)? {
            Some(value) => Ok(MockResponse::new(status).with_body(content_type, render_body(content_type, &value))),
            None => Ok(MockResponse::new(status)),
        }
    }
}

/// Operations declared on a path item, in document method order.
fn operations<'a>(item: &'a PathItem) -> impl Iterator<Item = (&'static str, &'a Operation)> {
    [
        ("GET", &item.get),
        ("PUT", &item.put),
        ("POST", &item.post),
        ("DELETE", &item.delete),
        ("OPTIONS", &item.options),
        ("HEAD", &item.head),
        ("PATCH", &item.patch),
        ("TRACE", &item.trace),
    ]
    .into_iter()
    .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
}

fn find_operation<'a>(item: &'a PathItem, method: &Method) -> Option<&'a Operation> {
    operations(item)
        .find(|(m, _)| *m == method.as_str())
        .map(|(_, op)| op)
}

fn not_found(method: &Method, path: &str, hint: Option<&str>) -> MockResponse {
    let mut body = json!({ "error": format!("no operation matches {method} {path}") });
    if let Some(hint) = hint {
        body["hint"] = Value::String(format!("did you mean {hint}?"));
    }
    MockResponse::json(StatusCode::NOT_FOUND, &body)
}

/// Lowest 2xx response, then `default`, then the lowest declared code.
fn select_response(responses: &Responses) -> Option<(StatusCode, &ReferenceOr<Response>)> {
    let mut declared: Vec<(u16, &ReferenceOr<Response>)> = responses
        .responses
        .iter()
        .map(|(code, resp)| match code {
            openapiv3::StatusCode::Code(c) => (*c, resp),
            openapiv3::StatusCode::Range(r) => (*r * 100, resp),
        })
        .collect();
    declared.sort_by_key(|(code, _)| *code);

    let status = |code: u16| StatusCode::from_u16(code).unwrap_or(StatusCode::OK);

    if let Some((code, resp)) = declared.iter().find(|(code, _)| (200..300).contains(code)) {
        return Some((status(*code), *resp));
    }
    if let Some(default) = &responses.default {
        return Some((StatusCode::OK, default));
    }
    declared.first().map(|(code, resp)| (status(*code), *resp))
}

/// Pick a media type: an exact `Accept` match, then JSON, then the first declared.
fn select_media<'r>(
    response: &'r Response,
    accept: Option<&str>,
) -> Option<(&'r str, &'r openapiv3::MediaType)> {
    if let Some(accept) = accept {
        for candidate in accept.split(',') {
            let candidate = candidate.split(';').next().unwrap_or("").trim();
            if let Some((ct, media)) = response.content.get_key_value(candidate) {
                return Some((ct.as_str(), media));
            }
        }
    }
    if let Some((ct, media)) = response.content.get_key_value("application/json") {
        return Some((ct.as_str(), media));
    }
    response
        .content
        .iter()
        .next()
        .map(|(ct, media)| (ct.as_str(), media))
}

fn render_body(content_type: &str, value: &Value) -> Vec<u8> {
    match value {
        Value::String(s) if !content_type.contains("json") => s.clone().into_bytes(),
        _ => serde_json::to_vec(value).unwrap_or_default(),
    }
}

#[async_trait]
impl MockEngine for OpenApiEngine {
    async fn serve(&self, request: MockRequest) -> Result<MockResponse, RequestFault> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RequestFault::new("mock engine has been closed"));
        }
        self.respond(&request)
    }

    fn response_examples(&self) -> Result<Vec<ResponseExample>, ServerError> {
        let mut examples = Vec::new();
        let mut failures = Vec::new();

        for (path, item) in &self.document.paths.paths {
            let ReferenceOr::Item(item) = item else {
                failures.push(format!("{path}: path item references are not supported"));
                continue;
            };
            for (method, operation) in operations(item) {
                let method = method.to_string();
                match self.example_response(operation, None) {
                    Ok(resp) => examples.push(ResponseExample {
                        method,
                        path: path.clone(),
                        status: resp.status.as_u16(),
                        content_type: resp
                            .headers
                            .get(header::CONTENT_TYPE)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string),
                    }),
                    Err(fault) => failures.push(format!("{method} {path}: {fault}")),
                }
            }
        }

        if failures.is_empty() {
            Ok(examples)
        } else {
            Err(ServerError::EngineError {
                path: self.spec_path.clone(),
                detail: failures.join("; "),
            })
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(spec = %self.spec_path.display(), "mock engine closed");
        }
    }
}
