//! Pipeline execution.
//!
//! Drives one request through the canonical stage order. Request-phase
//! stages may short-circuit with a finished response; the proxy (or
//! translator) produces a buffered response that the response-phase stages
//! rewrite in place before the single flush in the gateway handler.

use crate::middleware::bandwidth;
use crate::middleware::cache::{CachedResponse, Fill, ResponseCache};
use crate::middleware::compression;
use crate::middleware::context::{Admission, CapturedResponse, RequestCtx};
use crate::middleware::etag;
use crate::middleware::priority::PriorityAdmitter;
use crate::middleware::validation;
use crate::models::error::GatewayError;
use crate::services::metrics::MetricsCollector;
use crate::services::proxy::ProxyClient;
use crate::services::registry::RouteComponents;
use crate::translator::grpc::TranslatorResponse;
use actix_web::http::{Method, StatusCode};
use bytes::Bytes;
use futures::stream::BoxStream;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// What the handler flushes to the client.
pub enum FinalResponse {
    Buffered(CapturedResponse),
    Streaming {
        content_type: &'static str,
        stream: BoxStream<'static, Result<Bytes, std::io::Error>>,
    },
}

/// Mirror work deferred until after the primary response is flushed.
pub struct MirrorJob {
    pub mirror: Arc<crate::middleware::mirror::Mirror>,
    pub method: Method,
    pub path_and_query: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl MirrorJob {
    pub fn fire(self) {
        self.mirror
            .dispatch(self.method, self.path_and_query, self.headers, self.body);
    }
}

pub struct PipelineOutcome {
    pub response: FinalResponse,
    pub mirror: Option<MirrorJob>,
}

/// Shared pipeline driver; one per process.
pub struct Pipeline {
    pub proxy: ProxyClient,
    pub admitter: Option<Arc<PriorityAdmitter>>,
    pub metrics: MetricsCollector,
}

impl Pipeline {
    /// Runs the full pipeline for one request.
    pub async fn handle(
        &self,
        ctx: &mut RequestCtx,
        components: &Arc<RouteComponents>,
    ) -> Result<PipelineOutcome, GatewayError> {
        components.counters.requests.fetch_add(1, Ordering::Relaxed);

        // IP filter runs before authentication: a forbidden address gets
        // 403 no matter what credentials it presents.
        if let Some(filter) = &components.ip_filter {
            if !filter.permits(&ctx.client_ip) {
                components
                    .counters
                    .short_circuits
                    .fetch_add(1, Ordering::Relaxed);
                return Err(GatewayError::Forbidden {
                    message: format!("address {} is not allowed", ctx.client_ip),
                });
            }
        }

        if let Some(cors) = &components.cors {
            if let Admission::ShortCircuit(resp) = cors.admit(ctx) {
                components
                    .counters
                    .short_circuits
                    .fetch_add(1, Ordering::Relaxed);
                return Ok(self.finish(ctx, components, resp, true));
            }
        }

        if let Some(authenticator) = &components.authenticator {
            let claims = authenticator
                .authenticate(ctx.header("authorization"))
                .map_err(|message| GatewayError::Unauthorized { message })?;
            if let Some(authz) = &ctx.route.authorization {
                crate::middleware::auth::authorize(authz, &claims)
                    .map_err(|message| GatewayError::Forbidden { message })?;
            }
            ctx.claims = Some(claims);
        }

        // Validation precedes any body transform: malformed input never
        // reaches a backend.
        if let Some(config) = &ctx.route.validation {
            let content_type = ctx.header("content-type").map(|s| s.to_string());
            validation::validate_request(config, content_type.as_deref(), &ctx.body)
                .map_err(|message| GatewayError::Validation { message })?;
        }

        components.modifiers.apply_request(ctx);

        // Traffic-control block: rate limit, quota, adaptive, priority,
        // throttle, request-side bandwidth, fault dice.
        let mut rate_headers = None;
        if let Some(limiter) = &components.rate_limiter {
            let key = limiter.key_spec().extract(&ctx.key_source());
            let decision = limiter.check(&key);
            if !decision.allowed {
                let mut resp = limited_response("rate limit exceeded");
                resp.insert_header("X-RateLimit-Limit", &decision.limit.to_string());
                resp.insert_header("X-RateLimit-Remaining", &decision.remaining.to_string());
                resp.insert_header("X-RateLimit-Reset", &decision.reset_after.to_string());
                resp.insert_header("Retry-After", &decision.retry_after.to_string());
                components
                    .counters
                    .short_circuits
                    .fetch_add(1, Ordering::Relaxed);
                return Ok(self.finish(ctx, components, resp, true));
            }
            rate_headers = Some(decision);
        }

        let mut quota_headers = None;
        if let Some(quota) = &components.quota {
            let key = quota.key_spec().extract(&ctx.key_source());
            let decision = quota.check(&key).await;
            if !decision.allowed {
                let mut resp = limited_response("quota exceeded");
                resp.insert_header("X-Quota-Limit", &decision.limit.to_string());
                resp.insert_header("X-Quota-Remaining", &decision.remaining.to_string());
                resp.insert_header("X-Quota-Reset", &decision.reset.to_string());
                resp.insert_header("Retry-After", &decision.retry_after.to_string());
                components
                    .counters
                    .short_circuits
                    .fetch_add(1, Ordering::Relaxed);
                return Ok(self.finish(ctx, components, resp, true));
            }
            quota_headers = Some(decision);
        }

        let mut adaptive_permit = match &components.adaptive {
            Some(limiter) => match limiter.try_acquire() {
                Some(permit) => Some(permit),
                None => {
                    return Err(GatewayError::Overloaded {
                        message: "concurrency limit reached".to_string(),
                    });
                }
            },
            None => None,
        };
        // Everything past this point must release the adaptive permit.
        let adaptive_started = Instant::now();

        let _priority_permit = match (&self.admitter, &ctx.route.priority) {
            (Some(admitter), Some(config)) => {
                let level = config.level_for(&ctx.headers);
                match admitter.acquire(level).await {
                    Ok(permit) => Some(permit),
                    Err(()) => {
                        self.release_adaptive(components, adaptive_permit.take(), adaptive_started);
                        return Err(GatewayError::Overloaded {
                            message: "priority admission timed out".to_string(),
                        });
                    }
                }
            }
            _ => None,
        };

        if let Some(throttle) = &components.throttle {
            if throttle.acquire().await.is_err() {
                self.release_adaptive(components, adaptive_permit.take(), adaptive_started);
                return Err(GatewayError::Overloaded {
                    message: "throttle wait exceeded".to_string(),
                });
            }
        }

        if let Some(bw) = &ctx.route.bandwidth {
            bandwidth::pace_request(bw, ctx.body.len()).await;
        }

        if let Some(fault) = &components.fault {
            let outcome = fault.roll();
            if let Some(delay) = outcome.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(status) = outcome.abort {
                self.release_adaptive(components, adaptive_permit.take(), adaptive_started);
                let resp = CapturedResponse::with_json(
                    status,
                    json!({"error": {"code": status.as_u16(), "message": "fault injected"}}),
                );
                return Ok(self.finish(ctx, components, resp, true));
            }
        }

        // Cache consults storage before the proxy; WebSocket upgrades
        // bypass both the cache and the circuit breaker.
        let cacheable_request = !ctx.is_websocket
            && ctx.method == Method::GET
            && components.cache.is_some();
        let mut fill_guard = None;
        if cacheable_request {
            let cache = components.cache.as_ref().expect("checked above");
            let fp = cache.fingerprint(ctx.method.as_str(), &ctx.path, &ctx.query, &ctx.headers);
            if let Some(hit) = cache.lookup(&fp) {
                self.release_adaptive(components, adaptive_permit.take(), adaptive_started);
                let resp = cached_to_response(hit, true);
                return Ok(self.finish(ctx, components, resp, true));
            }
            match cache.begin_fill(&fp) {
                Fill::Leader(guard) => fill_guard = Some(guard),
                Fill::Follower(rx) => {
                    if let Some(hit) = ResponseCache::await_fill(rx).await {
                        self.release_adaptive(components, adaptive_permit.take(), adaptive_started);
                        let resp = cached_to_response(hit, true);
                        return Ok(self.finish(ctx, components, resp, true));
                    }
                    // Leader failed or the result was not storable; fall
                    // through and fetch the origin ourselves.
                }
            }
        }

        // Proxy or translator.
        let mut response = match &components.translator {
            Some(translator) => {
                let config = ctx.route.translator.as_ref().expect("translator config");
                match translator
                    .shared
                    .handle(ctx, config, &translator.mappings)
                    .await
                {
                    Ok(TranslatorResponse::Buffered(resp)) => resp,
                    Ok(TranslatorResponse::Streaming {
                        content_type,
                        stream,
                    }) => {
                        self.release_adaptive(components, adaptive_permit.take(), adaptive_started);
                        return Ok(PipelineOutcome {
                            response: FinalResponse::Streaming {
                                content_type,
                                stream,
                            },
                            mirror: mirror_job(ctx, components),
                        });
                    }
                    Err(err) => {
                        self.release_adaptive(components, adaptive_permit.take(), adaptive_started);
                        components.counters.errors.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                }
            }
            None => {
                match self
                    .proxy
                    .forward(ctx, components, ctx.is_websocket)
                    .await
                {
                    Ok(resp) => resp,
                    Err(err) => {
                        self.release_adaptive(components, adaptive_permit.take(), adaptive_started);
                        components.counters.errors.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                }
            }
        };

        self.release_adaptive(components, adaptive_permit.take(), adaptive_started);

        // Response phase.
        components.modifiers.apply_response(ctx, &mut response);
        if let Some(cors) = &components.cors {
            cors.decorate(ctx, &mut response);
        }

        if let Some(rewriter) = &components.jmespath {
            let content_type = response.content_type().map(|s| s.to_string());
            if let Some(body) = rewriter.apply(content_type.as_deref(), &response.body) {
                response.set_body(body);
            }
        }

        if let Some(config) = &ctx.route.etag {
            if response.is_success() && !response.body.is_empty() {
                let tag = etag::generate(&response.body, config.weak);
                response.insert_header("ETag", &tag);
                if let Some(if_none_match) = ctx.header("if-none-match") {
                    if etag::matches(if_none_match, &tag) {
                        response.status = StatusCode::NOT_MODIFIED;
                        response.set_body(Bytes::new());
                    }
                }
            }
        }

        if let Some(signer) = &components.signer {
            match signer.sign(&response.headers, &response.body) {
                Ok(value) => {
                    let name = signer.header_name().to_string();
                    response.insert_header(&name, &value);
                }
                Err(err) => {
                    // The unsigned response still goes out.
                    signer.record_error();
                    log::warn!("response signing failed for {}: {}", ctx.route.id, err);
                }
            }
        }

        if let Some(config) = &ctx.route.compression {
            let accept = ctx.header("accept-encoding").map(|s| s.to_string());
            let existing = response.header("content-encoding").map(|s| s.to_string());
            if let Some(compressed) =
                compression::maybe_compress(config, accept.as_deref(), existing.as_deref(), &response.body)
            {
                response.set_body(compressed);
                response.insert_header("Content-Encoding", "gzip");
                response.insert_header("Vary", "Accept-Encoding");
            }
        }

        if let Some(decision) = rate_headers {
            response.insert_header("X-RateLimit-Limit", &decision.limit.to_string());
            response.insert_header("X-RateLimit-Remaining", &decision.remaining.to_string());
            response.insert_header("X-RateLimit-Reset", &decision.reset_after.to_string());
        }
        if let Some(decision) = quota_headers {
            response.insert_header("X-Quota-Limit", &decision.limit.to_string());
            response.insert_header("X-Quota-Remaining", &decision.remaining.to_string());
            response.insert_header("X-Quota-Reset", &decision.reset.to_string());
        }

        // Cache insertion happens after compression so the stored body and
        // its Content-Encoding match what clients receive.
        if cacheable_request {
            response.insert_header("X-Cache", "MISS");
        }
        if let Some(guard) = fill_guard {
            let cache = components.cache.as_ref().expect("guard implies cache");
            let cache_control = response.header("cache-control");
            if ResponseCache::is_storable(response.status, cache_control) {
                guard.publish(Some(CachedResponse {
                    status: response.status,
                    headers: response.headers.clone(),
                    body: response.body.clone(),
                    content_encoding: response
                        .header("content-encoding")
                        .map(|s| s.to_string()),
                    expires_at: Instant::now() + cache.ttl(),
                }));
            } else {
                guard.publish(None);
            }
        }

        Ok(self.finish(ctx, components, response, false))
    }

    /// Wraps up a finished response and prepares the deferred mirror job.
    fn finish(
        &self,
        ctx: &RequestCtx,
        components: &Arc<RouteComponents>,
        response: CapturedResponse,
        short_circuit: bool,
    ) -> PipelineOutcome {
        let mirror = if short_circuit {
            // Requests the gateway answered itself are not mirrored.
            None
        } else {
            mirror_job(ctx, components)
        };
        PipelineOutcome {
            response: FinalResponse::Buffered(response),
            mirror,
        }
    }

    fn release_adaptive(
        &self,
        components: &Arc<RouteComponents>,
        permit: Option<crate::middleware::adaptive::AdaptivePermit>,
        started: Instant,
    ) {
        if let (Some(limiter), Some(permit)) = (&components.adaptive, permit) {
            limiter.release(permit, started.elapsed());
        }
    }
}

/// Sampling is rolled exactly once per request, here.
fn mirror_job(ctx: &RequestCtx, components: &Arc<RouteComponents>) -> Option<MirrorJob> {
    let mirror = components.mirror.as_ref()?;
    if !mirror.should_sample() {
        return None;
    }
    let headers = ctx
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    Some(MirrorJob {
        mirror: Arc::clone(mirror),
        method: ctx.method.clone(),
        path_and_query: ctx.upstream_path_and_query(),
        headers,
        // Independent copy, detached from the primary request.
        body: Bytes::copy_from_slice(&ctx.body),
    })
}

fn limited_response(message: &str) -> CapturedResponse {
    CapturedResponse::with_json(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"code": 429, "message": message}}),
    )
}

fn cached_to_response(hit: CachedResponse, mark_hit: bool) -> CapturedResponse {
    let mut resp = CapturedResponse {
        status: hit.status,
        headers: hit.headers,
        body: Bytes::new(),
    };
    resp.set_body(hit.body);
    if let Some(encoding) = hit.content_encoding {
        resp.insert_header("Content-Encoding", &encoding);
    }
    if mark_hit {
        resp.insert_header("X-Cache", "HIT");
    }
    resp
}
