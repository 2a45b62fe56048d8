//! The per-route middleware pipeline and its primitives.
//!
//! Stages are pre-built per route at load time (see
//! [`crate::services::registry`]) and executed by [`pipeline`] in one fixed
//! canonical order, regardless of how the configuration declares them:
//!
//! recovery, request logging, tracing and process metrics sit at the actix
//! layer; then IP filter, CORS, authentication, authorization, validation,
//! request transform, rate limit, quota, adaptive concurrency, priority
//! admission, throttle, request-side bandwidth, fault injection, circuit
//! breaker, retry, cache lookup, the proxy or translator, response
//! transform, JMESPath, ETag, response signing, compression, response-side
//! bandwidth and finally mirror dispatch after the primary response is
//! flushed.

pub mod adaptive;
pub mod auth;
pub mod bandwidth;
pub mod cache;
pub mod compression;
pub mod context;
pub mod cors;
pub mod etag;
pub mod fault;
pub mod ip_filter;
pub mod jmespath;
pub mod mirror;
pub mod modifier;
pub mod pipeline;
pub mod priority;
pub mod quota;
pub mod rate_limit;
pub mod signing;
pub mod throttle;
pub mod validation;
