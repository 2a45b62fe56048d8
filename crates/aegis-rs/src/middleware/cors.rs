//! Per-route CORS handling.
//!
//! Answers preflight `OPTIONS` requests directly and decorates ordinary
//! responses with the configured origin headers.

use crate::middleware::context::{Admission, CapturedResponse, RequestCtx};
use actix_web::http::{Method, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; `*` admits any origin.
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_methods")]
    pub allowed_methods: Vec<String>,
    #[serde(default)]
    pub allowed_headers: Vec<String>,
    #[serde(default)]
    pub allow_credentials: bool,
    /// Preflight cache lifetime in seconds.
    #[serde(default = "default_max_age")]
    pub max_age: u32,
}

fn default_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_age() -> u32 {
    3600
}

#[derive(Debug, Clone)]
pub struct Cors {
    config: CorsConfig,
}

impl Cors {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        self.config
            .allowed_origins
            .iter()
            .any(|o| o == "*" || o == origin)
    }

    fn allowed_origin_value(&self, origin: &str) -> String {
        if self.config.allowed_origins.iter().any(|o| o == "*") && !self.config.allow_credentials {
            "*".to_string()
        } else {
            origin.to_string()
        }
    }

    /// Request phase: answers preflights, otherwise passes through.
    pub fn admit(&self, ctx: &RequestCtx) -> Admission {
        let Some(origin) = ctx.header("origin").map(|s| s.to_string()) else {
            return Admission::Continue;
        };
        if ctx.method != Method::OPTIONS {
            return Admission::Continue;
        }
        let mut resp = CapturedResponse::new(StatusCode::NO_CONTENT);
        if self.origin_allowed(&origin) {
            resp.insert_header(
                "access-control-allow-origin",
                &self.allowed_origin_value(&origin),
            );
            resp.insert_header(
                "access-control-allow-methods",
                &self.config.allowed_methods.join(", "),
            );
            if !self.config.allowed_headers.is_empty() {
                resp.insert_header(
                    "access-control-allow-headers",
                    &self.config.allowed_headers.join(", "),
                );
            }
            if self.config.allow_credentials {
                resp.insert_header("access-control-allow-credentials", "true");
            }
            resp.insert_header("access-control-max-age", &self.config.max_age.to_string());
        }
        Admission::ShortCircuit(resp)
    }

    /// Response phase: adds the origin headers to proxied responses.
    pub fn decorate(&self, ctx: &RequestCtx, resp: &mut CapturedResponse) {
        let Some(origin) = ctx.header("origin").map(|s| s.to_string()) else {
            return;
        };
        if !self.origin_allowed(&origin) {
            return;
        }
        resp.insert_header(
            "access-control-allow-origin",
            &self.allowed_origin_value(&origin),
        );
        if self.config.allow_credentials {
            resp.insert_header("access-control-allow-credentials", "true");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::context::Admission;
    use crate::models::route::Route;
    use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};
    use bytes::Bytes;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn ctx_with(method: Method, origin: Option<&str>) -> RequestCtx {
        let mut headers = HeaderMap::new();
        if let Some(o) = origin {
            headers.insert(
                HeaderName::from_static("origin"),
                HeaderValue::from_str(o).unwrap(),
            );
        }
        RequestCtx {
            route: Arc::new(Route::exact("cors", "/api")),
            request_id: "r-1".into(),
            method,
            path: "/api".into(),
            query: String::new(),
            headers,
            body: Bytes::new(),
            client_ip: "127.0.0.1".into(),
            upstream_path: "/api".into(),
            is_websocket: false,
            claims: None,
            original_url: "/api".into(),
            port_override: None,
            started: Instant::now(),
            timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn preflight_short_circuits() {
        let cors = Cors::new(CorsConfig {
            allowed_origins: vec!["https://app.example".into()],
            allowed_methods: default_methods(),
            allowed_headers: vec![],
            allow_credentials: false,
            max_age: 600,
        });
        let ctx = ctx_with(Method::OPTIONS, Some("https://app.example"));
        match cors.admit(&ctx) {
            Admission::ShortCircuit(resp) => {
                assert_eq!(resp.status, StatusCode::NO_CONTENT);
                assert_eq!(
                    resp.header("access-control-allow-origin"),
                    Some("https://app.example")
                );
            }
            Admission::Continue => panic!("preflight must short-circuit"),
        }
    }

    #[test]
    fn non_preflight_passes_and_gets_decorated() {
        let cors = Cors::new(CorsConfig {
            allowed_origins: vec!["*".into()],
            allowed_methods: default_methods(),
            allowed_headers: vec![],
            allow_credentials: false,
            max_age: 600,
        });
        let ctx = ctx_with(Method::GET, Some("https://spa.example"));
        assert!(matches!(cors.admit(&ctx), Admission::Continue));
        let mut resp = CapturedResponse::new(StatusCode::OK);
        cors.decorate(&ctx, &mut resp);
        assert_eq!(resp.header("access-control-allow-origin"), Some("*"));
    }
}
