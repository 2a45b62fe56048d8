//! Upstream forwarding.
//!
//! The proxy stage selects a backend through the route's balancer, asks the
//! circuit breaker for admission, performs the upstream call with the retry
//! policy and buffers the response for the response-side stages. Every
//! retry attempt re-runs backend selection so a sick instance cannot poison
//! the whole request; the breaker records one outcome per request, after
//! retries are exhausted.

use crate::middleware::context::{CapturedResponse, RequestCtx};
use crate::models::error::GatewayError;
use crate::services::backend::BackendState;
use crate::services::registry::RouteComponents;
use crate::utils::path::format_target;
use actix_web::http::header::{HeaderName as ActixHeaderName, HeaderValue as ActixHeaderValue};
use actix_web::http::StatusCode;
use bytes::Bytes;
use reqwest::header::{HeaderMap as ReqwestHeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Hop-by-hop and proxy headers never forwarded upstream.
const SKIP_HEADERS: &[&str] = &["host", "connection", "upgrade", "proxy-connection", "keep-alive"];

#[derive(Clone)]
pub struct ProxyClient {
    client: Client,
}

impl ProxyClient {
    pub fn new() -> Result<Self, GatewayError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| GatewayError::Internal {
                message: format!("http client build failed: {}", e),
            })?;
        Ok(Self { client })
    }

    /// Forwards one request and returns the buffered upstream response.
    pub async fn forward(
        &self,
        ctx: &RequestCtx,
        components: &RouteComponents,
        bypass_breaker: bool,
    ) -> Result<CapturedResponse, GatewayError> {
        let route = &ctx.route;
        let retry = route.retry.clone();
        let max_attempts = retry.as_ref().map(|r| r.max_retries + 1).unwrap_or(1);
        components.retry_metrics.record_request();

        let hash_key = route
            .hash_key
            .as_ref()
            .map(|spec| spec.extract(&ctx.key_source()));

        let mut admission = None;
        let mut attempt: u32 = 0;
        let mut last_error: Option<GatewayError> = None;

        while attempt < max_attempts {
            attempt += 1;

            let backend = match components
                .balancer
                .select(&components.backends, hash_key.as_deref())
            {
                Some(backend) => backend,
                None => {
                    components
                        .counters
                        .no_healthy_backend
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    self.record_outcome(&admission, false);
                    return Err(GatewayError::NoHealthyBackend {
                        route: route.id.clone(),
                    });
                }
            };

            // Admission happens once per request, against the breaker
            // governing the first selected backend.
            if admission.is_none() && !bypass_breaker {
                if let Some(breakers) = &components.breakers {
                    let breaker = breakers.breaker_for(&backend.key());
                    match breaker.try_acquire() {
                        Ok(permit) => admission = Some((breaker, permit)),
                        Err(()) => {
                            return Err(GatewayError::CircuitOpen {
                                service: backend.key(),
                            });
                        }
                    }
                }
            }

            match self.attempt(ctx, components, &backend).await {
                Ok(response) => {
                    let status = response.status.as_u16();
                    let retryable = retry.as_ref().is_some_and(|cfg| {
                        cfg.status_retryable(status)
                            && cfg.method_retryable(ctx.method.as_str(), true)
                            && attempt < max_attempts
                    });
                    if retryable {
                        let cfg = retry.as_ref().expect("retryable implies config");
                        components.retry_metrics.record_retry();
                        log::warn!(
                            "route {} attempt {}/{} got retryable status {}",
                            route.id,
                            attempt,
                            max_attempts,
                            status
                        );
                        tokio::time::sleep(cfg.backoff(attempt)).await;
                        continue;
                    }
                    let success = status < 500;
                    self.record_outcome(&admission, success);
                    if success {
                        components.retry_metrics.record_success();
                    }
                    return Ok(response);
                }
                Err(error) => {
                    let retryable = retry.as_ref().is_some_and(|cfg| {
                        cfg.method_retryable(ctx.method.as_str(), true) && attempt < max_attempts
                    });
                    if retryable {
                        let cfg = retry.as_ref().expect("retryable implies config");
                        components.retry_metrics.record_retry();
                        log::warn!(
                            "route {} attempt {}/{} failed: {}",
                            route.id,
                            attempt,
                            max_attempts,
                            error
                        );
                        last_error = Some(error);
                        tokio::time::sleep(cfg.backoff(attempt)).await;
                        continue;
                    }
                    self.record_outcome(&admission, false);
                    return Err(error);
                }
            }
        }

        self.record_outcome(&admission, false);
        Err(last_error.unwrap_or(GatewayError::Internal {
            message: "retry loop ended without an outcome".to_string(),
        }))
    }

    /// One upstream attempt against one backend.
    async fn attempt(
        &self,
        ctx: &RequestCtx,
        components: &RouteComponents,
        backend: &Arc<BackendState>,
    ) -> Result<CapturedResponse, GatewayError> {
        let port = ctx.port_override.unwrap_or(backend.config.port);
        let target = format_target(&backend.config.host, port, &ctx.upstream_path_and_query());
        log::debug!("forwarding request {} to {}", ctx.request_id, target);

        let method = reqwest::Method::from_bytes(ctx.method.as_str().as_bytes()).map_err(|e| {
            GatewayError::Internal {
                message: format!("method conversion failed: {}", e),
            }
        })?;

        let budget = ctx.remaining().min(ctx.timeout);
        if budget.is_zero() {
            return Err(GatewayError::Timeout {
                seconds: ctx.timeout.as_secs(),
            });
        }

        components
            .counters
            .upstream_calls
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        backend.begin_request();
        let started = Instant::now();

        let request = self
            .client
            .request(method, &target)
            .headers(build_upstream_headers(&ctx.headers))
            .body(ctx.body.to_vec())
            .timeout(budget);

        let outcome = request.send().await;
        let result = match outcome {
            Ok(response) => {
                let status = StatusCode::from_u16(response.status().as_u16())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                let mut captured = CapturedResponse::new(status);
                for (name, value) in response.headers() {
                    if name.as_str().starts_with("connection") {
                        continue;
                    }
                    if let (Ok(name), Ok(value)) = (
                        ActixHeaderName::from_bytes(name.as_str().as_bytes()),
                        ActixHeaderValue::from_bytes(value.as_bytes()),
                    ) {
                        captured.headers.append(name, value);
                    }
                }
                match response.bytes().await {
                    Ok(body) => {
                        captured.set_body(Bytes::from(body.to_vec()));
                        Ok(captured)
                    }
                    Err(e) => Err(GatewayError::Upstream {
                        message: format!("body read failed: {}", e),
                        url: target.clone(),
                        status: Some(status.as_u16()),
                    }),
                }
            }
            Err(e) if e.is_timeout() => Err(GatewayError::Timeout {
                seconds: ctx.timeout.as_secs(),
            }),
            Err(e) => Err(GatewayError::Upstream {
                message: e.to_string(),
                url: target.clone(),
                status: None,
            }),
        };

        backend.end_request();
        backend.record_latency(started.elapsed());
        result
    }

    fn record_outcome(
        &self,
        admission: &Option<(
            Arc<crate::services::circuit_breaker::CircuitBreaker>,
            crate::services::circuit_breaker::BreakerPermit,
        )>,
        success: bool,
    ) {
        if let Some((breaker, permit)) = admission {
            if success {
                breaker.on_success(*permit);
            } else {
                breaker.on_failure(*permit);
            }
        }
    }
}

/// Converts and filters request headers for the upstream call.
fn build_upstream_headers(
    original: &actix_web::http::header::HeaderMap,
) -> ReqwestHeaderMap {
    let mut headers = ReqwestHeaderMap::with_capacity(original.len());
    for (name, value) in original.iter() {
        let lower = name.as_str().to_ascii_lowercase();
        if SKIP_HEADERS.iter().any(|skip| lower.starts_with(skip)) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            headers.insert(name, value);
        }
    }
    headers
        .entry("user-agent")
        .or_insert_with(|| HeaderValue::from_static(concat!("aegis-rs/", env!("CARGO_PKG_VERSION"))));
    headers
}
