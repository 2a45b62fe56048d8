//! Gateway error taxonomy.
//!
//! Every failure surfaced to a client maps to one of these variants; the
//! `ResponseError` impl renders the gateway-originated JSON body
//! `{"error":{"code":<num>,"message":<string>}}`. Upstream pass-through
//! errors never take this path - the proxy forwards the upstream body as-is.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration problem detected at load or reload. Fatal at boot.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Request failed validation before reaching any backend.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Missing or invalid credentials.
    #[error("authentication failed: {message}")]
    Unauthorized { message: String },

    /// Authenticated but not allowed.
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// No route matched the request method and path.
    #[error("no route matched path: {path}")]
    RouteNotFound { path: String },

    /// Rate limit or quota exceeded.
    #[error("too many requests: {message}")]
    RateLimited { message: String, retry_after: u64 },

    /// Circuit breaker is open for the target service.
    #[error("circuit open for {service}")]
    CircuitOpen { service: String },

    /// The route has no healthy backend to serve the request.
    #[error("no healthy backend for route {route}")]
    NoHealthyBackend { route: String },

    /// Concurrency or admission limit rejected the request.
    #[error("overloaded: {message}")]
    Overloaded { message: String },

    /// Upstream did not answer within the deadline.
    #[error("upstream timeout after {seconds}s")]
    Timeout { seconds: u64 },

    /// Upstream connection or protocol failure.
    #[error("upstream error for {url}: {message}")]
    Upstream {
        message: String,
        url: String,
        status: Option<u16>,
    },

    /// Protocol translator could not map the request.
    #[error("translation error: {message}")]
    Translation { message: String },

    /// Anything that should never happen.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// HTTP status for this error kind.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Validation { .. } => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden { .. } => StatusCode::FORBIDDEN,
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::NoHealthyBackend { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Overloaded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Translation { .. } => StatusCode::BAD_REQUEST,
            GatewayError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Renders the gateway-originated error body.
    pub fn to_response(&self) -> HttpResponse {
        let status = self.status();
        let mut builder = HttpResponse::build(status);
        if let GatewayError::RateLimited { retry_after, .. } = self {
            builder.insert_header(("Retry-After", retry_after.to_string()));
        }
        builder.json(json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
            }
        }))
    }
}

impl actix_web::error::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        self.to_response()
    }
}
