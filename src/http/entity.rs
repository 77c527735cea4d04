//! Request payload hydration for handlers that declare an entity attribute.
//!
//! # Responsibilities
//! - Look up the matched handler's `EntityAttribute`
//! - Collect the payload: JSON body for POST/PUT/OPTIONS, query otherwise
//! - Attach an `EntityInput` extension for the handler
//!
//! # Design Decisions
//! - Runs as a route-level middleware, after routing, so the handler is known
//! - Handlers without an attribute pass through untouched

use std::sync::Arc;

use axum::{
    body::Body,
    extract::Query,
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::{Map, Value};

use crate::handler::{Middleware, Next, Registry};
use crate::http::app::MatchedRoute;

/// Default upper bound on a buffered request body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Payload collected for an entity-aware handler.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInput {
    pub dto: String,
    pub entity: Option<String>,
    pub data: Map<String, Value>,
}

impl EntityInput {
    /// Deserialize the payload into a concrete transfer object.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.data.clone()))
    }
}

pub struct EntityMiddleware {
    registry: Arc<Registry>,
    max_body_bytes: usize,
}

impl EntityMiddleware {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

impl Middleware for EntityMiddleware {
    fn process(&self, request: Request<Body>, next: Next) -> BoxFuture<'static, Response> {
        let attribute = request
            .extensions()
            .get::<MatchedRoute>()
            .and_then(|matched| self.registry.entity_of(&matched.handler))
            .cloned();

        let Some(attribute) = attribute else {
            return next.run(request);
        };

        let limit = self.max_body_bytes;
        async move {
            let (mut parts, body) = request.into_parts();

            let (data, body) = if reads_body(&parts.method) {
                let bytes = match axum::body::to_bytes(body, limit).await {
                    Ok(bytes) => bytes,
                    Err(_) => return reject(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"),
                };
                let data = match parse_body(&bytes) {
                    Ok(data) => data,
                    Err(reason) => return reject(StatusCode::BAD_REQUEST, &reason),
                };
                (data, Body::from(bytes))
            } else {
                (parse_query(&parts.uri), body)
            };

            tracing::debug!(dto = %attribute.dto, fields = data.len(), "Entity input attached");
            parts.extensions.insert(EntityInput {
                dto: attribute.dto,
                entity: attribute.entity,
                data,
            });
            next.run(Request::from_parts(parts, body)).await
        }
        .boxed()
    }
}

fn reads_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::OPTIONS)
}

fn parse_body(bytes: &[u8]) -> Result<Map<String, Value>, String> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("request body must be a JSON object".to_string()),
        Err(e) => Err(format!("malformed JSON body: {e}")),
    }
}

/// Repeated keys keep the last value.
fn parse_query(uri: &axum::http::Uri) -> Map<String, Value> {
    Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map(|Query(pairs)| {
            pairs
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect()
        })
        .unwrap_or_default()
}

fn reject(status: StatusCode, reason: &str) -> Response {
    (status, Json(serde_json::json!({ "error": reason }))).into_response()
}
