//! The data-plane resource: one catch-all route feeding the pipeline.

use crate::middleware::bandwidth;
use crate::middleware::context::RequestCtx;
use crate::middleware::pipeline::FinalResponse;
use crate::models::error::GatewayError;
use crate::router::RouteMatch;
use crate::routes::AppState;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{web, HttpRequest, HttpResponse};
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Payload cap for buffered request bodies.
const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Mounts the catch-all proxy resource.
pub fn configure_gateway(cfg: &mut web::ServiceConfig, state: Arc<AppState>) {
    cfg.app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES))
        .app_data(web::Data::new(state))
        .service(web::resource("/{tail:.*}").to(proxy_entry));
}

async fn proxy_entry(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<Arc<AppState>>,
) -> HttpResponse {
    let started = Instant::now();
    state.metrics.increment_connections();

    let mut response = match handle(&req, body, &state).await {
        Ok(response) => response,
        Err(error) => {
            log::debug!("request {} {} failed: {}", req.method(), req.path(), error);
            error.to_response()
        }
    };

    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static("x-request-id"), value);
    }

    state
        .metrics
        .record_request(response.status().as_u16(), started.elapsed());
    state.metrics.decrement_connections();
    response
}

async fn handle(
    req: &HttpRequest,
    body: web::Bytes,
    state: &web::Data<Arc<AppState>>,
) -> Result<HttpResponse, GatewayError> {
    let method = req.method().clone();
    let path = req.path().to_string();

    let matched = state
        .table
        .load()
        .resolve(method.as_str(), &path)
        .ok_or(GatewayError::RouteNotFound { path: path.clone() })?;
    let components =
        state
            .registry
            .get(&matched.route.id)
            .ok_or_else(|| GatewayError::Internal {
                message: format!("no components registered for route {}", matched.route.id),
            })?;

    let mut ctx = build_ctx(req, body, matched)?;
    let outcome = state.pipeline.handle(&mut ctx, &components).await?;

    let response = flush(outcome.response, &ctx);
    // Mirror work starts only once the primary response is on its way out;
    // it runs detached and can neither delay nor fail the client.
    if let Some(job) = outcome.mirror {
        job.fire();
    }
    Ok(response)
}

fn build_ctx(
    req: &HttpRequest,
    body: web::Bytes,
    matched: RouteMatch,
) -> Result<RequestCtx, GatewayError> {
    let query = req.query_string().to_string();
    let path = req.path().to_string();
    let original_url = if query.is_empty() {
        path.clone()
    } else {
        format!("{}?{}", path, query)
    };

    let client_ip = req
        .connection_info()
        .realip_remote_addr()
        .map(strip_port)
        .unwrap_or_else(|| "unknown".to_string());

    let is_websocket = req
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));

    // Route timeout, tightened by a request-supplied deadline when nearer.
    let mut timeout = matched.route.timeout;
    if let Some(requested) = req
        .headers()
        .get("x-request-timeout")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| duration_str::parse(v).ok())
    {
        timeout = timeout.min(requested);
    }
    if timeout.is_zero() {
        timeout = Duration::from_millis(1);
    }

    Ok(RequestCtx {
        request_id: Uuid::new_v4().to_string(),
        method: req.method().clone(),
        path,
        query,
        headers: req.headers().clone(),
        body: Bytes::from(body.to_vec()),
        client_ip,
        upstream_path: matched.upstream_path,
        is_websocket,
        claims: None,
        original_url,
        port_override: None,
        started: Instant::now(),
        timeout,
        route: matched.route,
    })
}

/// The single flush point: buffered responses go out as-is, or paced when
/// the route shapes response bandwidth; translator streams go out chunked.
fn flush(response: FinalResponse, ctx: &RequestCtx) -> HttpResponse {
    match response {
        FinalResponse::Buffered(captured) => {
            let response_bps = ctx
                .route
                .bandwidth
                .as_ref()
                .and_then(|bw| bw.response_bytes_per_second);
            match response_bps {
                Some(bps) => {
                    let chunk = ctx
                        .route
                        .bandwidth
                        .as_ref()
                        .map(|bw| bw.chunk_size)
                        .unwrap_or(8 * 1024);
                    let mut builder = HttpResponse::build(captured.status);
                    for (name, value) in captured.headers.iter() {
                        if name == "content-length" || name.as_str().starts_with("connection") {
                            continue;
                        }
                        builder.append_header((name.clone(), value.clone()));
                    }
                    builder.streaming(bandwidth::paced_stream(captured.body, bps, chunk))
                }
                None => captured.into_http_response(),
            }
        }
        FinalResponse::Streaming {
            content_type,
            stream,
        } => HttpResponse::Ok()
            .insert_header(("content-type", content_type))
            .streaming(stream),
    }
}

fn strip_port(addr: &str) -> String {
    if let Ok(socket) = addr.parse::<std::net::SocketAddr>() {
        return socket.ip().to_string();
    }
    addr.to_string()
}
