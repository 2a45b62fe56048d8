//! Per-request context and the buffered response capture.
//!
//! The pipeline operates on a [`RequestCtx`] built once per accepted request
//! and a [`CapturedResponse`] that buffers status, headers and body so
//! response-side stages can rewrite them before anything is flushed to the
//! client. `Content-Length` is maintained by [`CapturedResponse::set_body`];
//! stages must never write the real response writer themselves.

use crate::models::route::Route;
use crate::utils::keys::KeySource;
use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};
use actix_web::http::{Method, StatusCode};
use actix_web::HttpResponse;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything the pipeline knows about one in-flight request.
pub struct RequestCtx {
    pub route: Arc<Route>,
    pub request_id: String,
    pub method: Method,
    pub path: String,
    pub query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: String,
    /// Path after route rewriting, sent upstream.
    pub upstream_path: String,
    /// Upgrade requests skip cache and circuit breaker.
    pub is_websocket: bool,
    /// Claims of the validated JWT, when the auth stage ran.
    pub claims: Option<serde_json::Value>,
    /// Full original URL, stashed by the `stash` modifier.
    pub original_url: String,
    /// Upstream port override set by the `port` modifier.
    pub port_override: Option<u16>,
    pub started: Instant,
    /// Effective deadline: route timeout or the request-supplied one,
    /// whichever is nearer.
    pub timeout: Duration,
}

impl RequestCtx {
    /// View used by key specs (rate limit, quota, consistent hashing).
    pub fn key_source(&self) -> KeySource<'_> {
        KeySource {
            client_ip: &self.client_ip,
            headers: &self.headers,
            query: &self.query,
            claims: self.claims.as_ref(),
        }
    }

    /// Remaining time before the request deadline.
    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.started.elapsed())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Path plus query, as forwarded upstream.
    pub fn upstream_path_and_query(&self) -> String {
        if self.query.is_empty() {
            self.upstream_path.clone()
        } else {
            format!("{}?{}", self.upstream_path, self.query)
        }
    }
}

/// Buffered response: status, headers and body captured before flush.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CapturedResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_json(status: StatusCode, value: serde_json::Value) -> Self {
        let mut resp = Self::new(status);
        resp.insert_header("content-type", "application/json");
        resp.set_body(Bytes::from(value.to_string()));
        resp
    }

    /// Replaces the body and keeps `Content-Length` in sync with the final
    /// byte count.
    pub fn set_body(&mut self, body: Bytes) {
        let len = body.len();
        self.body = body;
        if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
            self.headers
                .insert(HeaderName::from_static("content-length"), value);
        }
    }

    pub fn insert_header(&mut self, name: &str, value: &str) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Final conversion to the real writer. This is the single flush point.
    pub fn into_http_response(self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status);
        for (name, value) in self.headers.iter() {
            // actix recomputes framing headers for the body it writes.
            if name == "content-length" || name.as_str().starts_with("connection") {
                continue;
            }
            builder.append_header((name.clone(), value.clone()));
        }
        builder.body(self.body)
    }
}

/// Outcome of a request-phase stage.
pub enum Admission {
    /// Continue with the next stage.
    Continue,
    /// Stop the pipeline and answer the client with this response.
    ShortCircuit(CapturedResponse),
}
