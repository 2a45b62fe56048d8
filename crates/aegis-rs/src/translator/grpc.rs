//! HTTP/JSON to gRPC translation.
//!
//! The translator owns one lazily-created HTTP/2 channel per backend URL
//! (shared by every request, torn down by `close_all`) and the process-wide
//! descriptor cache. Dispatch is fully dynamic: the method descriptor's
//! streaming flags pick unary, server-stream (NDJSON out), client-stream
//! (NDJSON in) or bidirectional handling, and messages are built from
//! descriptors at dispatch time.

use crate::middleware::context::{CapturedResponse, RequestCtx};
use crate::models::error::GatewayError;
use crate::translator::codec::DynamicCodec;
use crate::translator::descriptor::DescriptorCache;
use crate::translator::rest::{assemble_request, CompiledMapping};
use crate::translator::status::grpc_to_http;
use crate::translator::TranslatorConfig;
use actix_web::http::{Method, StatusCode};
use bytes::Bytes;
use dashmap::DashMap;
use futures::stream::BoxStream;
use futures::StreamExt;
use prost_reflect::{DescriptorPool, DynamicMessage, MethodDescriptor};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tonic::transport::{Channel, Endpoint};
use tonic::IntoRequest;

/// What the proxy stage flushes for a translated request.
pub enum TranslatorResponse {
    Buffered(CapturedResponse),
    /// NDJSON stream; each line is flushed as it is produced.
    Streaming {
        content_type: &'static str,
        stream: BoxStream<'static, Result<Bytes, std::io::Error>>,
    },
}

#[derive(Debug, Default)]
pub struct TranslatorMetrics {
    requests: AtomicU64,
    errors: AtomicU64,
    unary: AtomicU64,
    server_streaming: AtomicU64,
    client_streaming: AtomicU64,
    bidi_streaming: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslatorSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub unary: u64,
    pub server_streaming: u64,
    pub client_streaming: u64,
    pub bidi_streaming: u64,
    pub pooled_channels: usize,
    pub cached_descriptors: usize,
}

/// The `http_to_grpc` translator, registered once per process.
pub struct GrpcTranslator {
    channels: DashMap<String, Channel>,
    descriptors: DescriptorCache,
    metrics: TranslatorMetrics,
}

impl GrpcTranslator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: DashMap::new(),
            descriptors: DescriptorCache::new(),
            metrics: TranslatorMetrics::default(),
        })
    }

    /// Shared channel per backend URL with load-or-store semantics: racing
    /// creators agree on whichever entry lands first.
    fn channel_for(&self, backend: &str) -> Result<Channel, GatewayError> {
        if let Some(existing) = self.channels.get(backend) {
            return Ok(existing.clone());
        }
        let endpoint = Endpoint::from_shared(backend.to_string()).map_err(|e| {
            GatewayError::Translation {
                message: format!("invalid gRPC backend {}: {}", backend, e),
            }
        })?;
        let channel = endpoint.connect_lazy();
        Ok(self
            .channels
            .entry(backend.to_string())
            .or_insert(channel)
            .clone())
    }

    /// Drops every pooled channel.
    pub fn close_all(&self) {
        self.channels.clear();
    }

    pub fn snapshot(&self) -> TranslatorSnapshot {
        TranslatorSnapshot {
            requests: self.metrics.requests.load(Ordering::Relaxed),
            errors: self.metrics.errors.load(Ordering::Relaxed),
            unary: self.metrics.unary.load(Ordering::Relaxed),
            server_streaming: self.metrics.server_streaming.load(Ordering::Relaxed),
            client_streaming: self.metrics.client_streaming.load(Ordering::Relaxed),
            bidi_streaming: self.metrics.bidi_streaming.load(Ordering::Relaxed),
            pooled_channels: self.channels.len(),
            cached_descriptors: self.descriptors.len(),
        }
    }

    /// Translates one request.
    pub async fn handle(
        &self,
        ctx: &RequestCtx,
        config: &TranslatorConfig,
        mappings: &[CompiledMapping],
    ) -> Result<TranslatorResponse, GatewayError> {
        self.metrics.requests.fetch_add(1, Ordering::Relaxed);
        let result = self.handle_inner(ctx, config, mappings).await;
        if result.is_err() {
            self.metrics.errors.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    async fn handle_inner(
        &self,
        ctx: &RequestCtx,
        config: &TranslatorConfig,
        mappings: &[CompiledMapping],
    ) -> Result<TranslatorResponse, GatewayError> {
        let (service, method, request_value) = resolve_method(ctx, config, mappings)?;

        let channel = self.channel_for(&config.backend)?;
        let pool = self
            .descriptors
            .get_or_fetch(&config.backend, channel.clone(), config.descriptor_ttl)
            .await
            .map_err(|message| GatewayError::Translation { message })?;

        let descriptor = method_descriptor(&pool, &service, &method)?;
        let path = rpc_path(&service, &method)?;
        let codec = DynamicCodec::new(descriptor.input(), descriptor.output());
        let mut grpc = tonic::client::Grpc::new(channel);
        grpc.ready().await.map_err(|e| GatewayError::Upstream {
            message: format!("gRPC channel not ready: {}", e),
            url: config.backend.clone(),
            status: None,
        })?;

        match (
            descriptor.is_client_streaming(),
            descriptor.is_server_streaming(),
        ) {
            (false, false) => {
                self.metrics.unary.fetch_add(1, Ordering::Relaxed);
                let message = json_to_message(&descriptor, &request_value)?;
                let response = tokio::time::timeout(
                    ctx.remaining(),
                    grpc.unary(message.into_request(), path, codec),
                )
                .await
                .map_err(|_| GatewayError::Timeout {
                    seconds: ctx.timeout.as_secs(),
                })?;
                match response {
                    Ok(response) => buffered_json(response.into_inner()),
                    Err(status) => Ok(TranslatorResponse::Buffered(grpc_error(&status))),
                }
            }
            (false, true) => {
                self.metrics.server_streaming.fetch_add(1, Ordering::Relaxed);
                let message = json_to_message(&descriptor, &request_value)?;
                match grpc
                    .server_streaming(message.into_request(), path, codec)
                    .await
                {
                    Ok(response) => Ok(ndjson_stream(response.into_inner())),
                    Err(status) => Ok(TranslatorResponse::Buffered(grpc_error(&status))),
                }
            }
            (true, false) => {
                self.metrics.client_streaming.fetch_add(1, Ordering::Relaxed);
                let messages = body_messages(&descriptor, &ctx.body)?;
                let response = tokio::time::timeout(
                    ctx.remaining(),
                    grpc.client_streaming(
                        tonic::Request::new(futures::stream::iter(messages)),
                        path,
                        codec,
                    ),
                )
                .await
                .map_err(|_| GatewayError::Timeout {
                    seconds: ctx.timeout.as_secs(),
                })?;
                match response {
                    Ok(response) => buffered_json(response.into_inner()),
                    Err(status) => Ok(TranslatorResponse::Buffered(grpc_error(&status))),
                }
            }
            (true, true) => {
                self.metrics.bidi_streaming.fetch_add(1, Ordering::Relaxed);
                let messages = body_messages(&descriptor, &ctx.body)?;
                match grpc
                    .streaming(
                        tonic::Request::new(futures::stream::iter(messages)),
                        path,
                        codec,
                    )
                    .await
                {
                    Ok(response) => Ok(ndjson_stream(response.into_inner())),
                    Err(status) => Ok(TranslatorResponse::Buffered(grpc_error(&status))),
                }
            }
        }
    }
}

/// Method resolution priority: fixed configuration, REST mapping, then the
/// `/package.Service/Method` path form (POST only).
fn resolve_method(
    ctx: &RequestCtx,
    config: &TranslatorConfig,
    mappings: &[CompiledMapping],
) -> Result<(String, String, Value), GatewayError> {
    if let (Some(service), Some(method)) = (&config.service, &config.method) {
        let value = if ctx.body.is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_slice(&ctx.body).map_err(|e| GatewayError::Validation {
                message: format!("request body is not valid JSON: {}", e),
            })?
        };
        return Ok((service.clone(), method.clone(), value));
    }

    for mapping in mappings {
        if let Some(params) = mapping.capture(ctx.method.as_str(), &ctx.path) {
            let value = assemble_request(&params, &ctx.query, &ctx.body, mapping.body.as_deref());
            return Ok((mapping.service.clone(), mapping.method.clone(), value));
        }
    }

    if ctx.method == Method::POST {
        let mut segments = ctx.path.trim_start_matches('/').splitn(2, '/');
        if let (Some(service), Some(method)) = (segments.next(), segments.next()) {
            if service.contains('.') && !method.is_empty() && !method.contains('/') {
                let value = if ctx.body.is_empty() {
                    Value::Object(serde_json::Map::new())
                } else {
                    serde_json::from_slice(&ctx.body).map_err(|e| GatewayError::Validation {
                        message: format!("request body is not valid JSON: {}", e),
                    })?
                };
                return Ok((service.to_string(), method.to_string(), value));
            }
        }
    }

    Err(GatewayError::Translation {
        message: format!(
            "no gRPC method resolved for {} {}",
            ctx.method, ctx.path
        ),
    })
}

fn method_descriptor(
    pool: &DescriptorPool,
    service: &str,
    method: &str,
) -> Result<MethodDescriptor, GatewayError> {
    let service_desc =
        pool.get_service_by_name(service)
            .ok_or_else(|| GatewayError::Translation {
                message: format!("unknown gRPC service: {}", service),
            })?;
    service_desc
        .methods()
        .find(|m| m.name() == method)
        .ok_or_else(|| GatewayError::Translation {
            message: format!("unknown method {} on service {}", method, service),
        })
}

fn rpc_path(service: &str, method: &str) -> Result<http::uri::PathAndQuery, GatewayError> {
    http::uri::PathAndQuery::try_from(format!("/{}/{}", service, method)).map_err(|e| {
        GatewayError::Translation {
            message: format!("invalid rpc path: {}", e),
        }
    })
}

fn json_to_message(
    descriptor: &MethodDescriptor,
    value: &Value,
) -> Result<DynamicMessage, GatewayError> {
    let mut deserializer = serde_json::Deserializer::from_str(&value.to_string());
    DynamicMessage::deserialize(descriptor.input(), &mut deserializer).map_err(|e| {
        GatewayError::Translation {
            message: format!("request does not match {}: {}", descriptor.input().name(), e),
        }
    })
}

/// Parses the request body as NDJSON, one message per line.
fn body_messages(
    descriptor: &MethodDescriptor,
    body: &Bytes,
) -> Result<Vec<DynamicMessage>, GatewayError> {
    let text = std::str::from_utf8(body).map_err(|_| GatewayError::Validation {
        message: "streaming request body must be UTF-8 NDJSON".to_string(),
    })?;
    let mut messages = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut deserializer = serde_json::Deserializer::from_str(line);
        let message = DynamicMessage::deserialize(descriptor.input(), &mut deserializer)
            .map_err(|e| GatewayError::Validation {
                message: format!("NDJSON line does not match the request message: {}", e),
            })?;
        messages.push(message);
    }
    Ok(messages)
}

fn buffered_json(message: DynamicMessage) -> Result<TranslatorResponse, GatewayError> {
    let body = serde_json::to_vec(&message).map_err(|e| GatewayError::Translation {
        message: format!("response serialization failed: {}", e),
    })?;
    let mut resp = CapturedResponse::new(StatusCode::OK);
    resp.insert_header("content-type", "application/json");
    resp.set_body(Bytes::from(body));
    Ok(TranslatorResponse::Buffered(resp))
}

/// Maps a gRPC error to HTTP plus the `Grpc-Status`/`Grpc-Message`
/// headers.
fn grpc_error(status: &tonic::Status) -> CapturedResponse {
    let mut resp = CapturedResponse::with_json(
        grpc_to_http(status.code()),
        serde_json::json!({
            "error": {
                "code": grpc_to_http(status.code()).as_u16(),
                "message": status.message(),
            }
        }),
    );
    resp.insert_header("Grpc-Status", &(status.code() as i32).to_string());
    resp.insert_header("Grpc-Message", status.message());
    resp
}

/// Server messages become NDJSON lines; each line is its own chunk so the
/// client sees it before the next message is produced.
fn ndjson_stream(stream: tonic::Streaming<DynamicMessage>) -> TranslatorResponse {
    let mapped = stream.map(|item| match item {
        Ok(message) => match serde_json::to_vec(&message) {
            Ok(mut line) => {
                line.push(b'\n');
                Ok(Bytes::from(line))
            }
            Err(e) => Err(std::io::Error::other(format!(
                "response serialization failed: {}",
                e
            ))),
        },
        Err(status) => Err(std::io::Error::other(format!(
            "stream error {}: {}",
            status.code(),
            status.message()
        ))),
    });
    TranslatorResponse::Streaming {
        content_type: "application/x-ndjson",
        stream: mapped.boxed(),
    }
}
