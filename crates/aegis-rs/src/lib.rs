//! # aegis-rs
//!
//! Core library for the Aegis programmable API gateway.
//!
//! Aegis terminates HTTP requests, runs each one through a per-route pipeline
//! of cross-cutting concerns (authentication, rate limiting, quota, traffic
//! shaping, caching, transformation, protocol translation), selects a healthy
//! backend through a load balancer and proxies the request upstream. The
//! library is consumed by the `aegis-gateway` binary, which wires the data
//! plane and the admin plane to actual listeners.
//!
//! ## Module map
//!
//! - [`models`] - configuration and error data model
//! - [`config`] - settings loading, validation and hot reload
//! - [`router`] - method + path resolution to a route
//! - [`middleware`] - the per-route pipeline and its primitives
//! - [`services`] - load balancing, circuit breaking, retries, proxying,
//!   health checking and the per-route registry
//! - [`translator`] - HTTP to gRPC protocol translation
//! - [`routes`] - actix-web resources for the data plane and admin plane
//! - [`logs`] - logger configuration
//! - [`utils`] - path building and client key extraction

pub mod config;
pub mod logs;
pub mod middleware;
pub mod models;
pub mod router;
pub mod routes;
pub mod services;
pub mod translator;
pub mod utils;
