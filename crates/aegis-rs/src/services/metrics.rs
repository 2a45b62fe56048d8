//! Gateway-wide request metrics.
//!
//! Lightweight atomic counters recorded around every request and exposed as
//! a JSON snapshot on the admin surface. Exporters are out of scope; this
//! is the raw material they would read.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct RouteCounters {
    pub requests: AtomicU64,
    pub upstream_calls: AtomicU64,
    pub no_healthy_backend: AtomicU64,
    pub short_circuits: AtomicU64,
    pub errors: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteCountersSnapshot {
    pub requests: u64,
    pub upstream_calls: u64,
    pub no_healthy_backend: u64,
    pub short_circuits: u64,
    pub errors: u64,
}

impl RouteCounters {
    pub fn snapshot(&self) -> RouteCountersSnapshot {
        RouteCountersSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            upstream_calls: self.upstream_calls.load(Ordering::Relaxed),
            no_healthy_backend: self.no_healthy_backend.load(Ordering::Relaxed),
            short_circuits: self.short_circuits.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Process-wide collector shared by every worker.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    total_requests: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    status_2xx: AtomicU64,
    status_3xx: AtomicU64,
    status_4xx: AtomicU64,
    status_5xx: AtomicU64,
    active_connections: AtomicI64,
    total_latency_us: AtomicU64,
    routes: DashMap<String, Arc<RouteCounters>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful: u64,
    pub failed: u64,
    pub status_2xx: u64,
    pub status_3xx: u64,
    pub status_4xx: u64,
    pub status_5xx: u64,
    pub active_connections: i64,
    pub average_latency_ms: f64,
    pub routes: std::collections::BTreeMap<String, RouteCountersSnapshot>,
}

impl MetricsCollector {
    pub fn increment_connections(&self) {
        self.inner.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_connections(&self) {
        self.inner.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_request(&self, status: u16, duration: Duration) {
        self.inner.total_requests.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_latency_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        let bucket = match status {
            200..=299 => &self.inner.status_2xx,
            300..=399 => &self.inner.status_3xx,
            400..=499 => &self.inner.status_4xx,
            _ => &self.inner.status_5xx,
        };
        bucket.fetch_add(1, Ordering::Relaxed);
        if (200..400).contains(&status) {
            self.inner.successful.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Per-route counters, created on first touch.
    pub fn route(&self, route_id: &str) -> Arc<RouteCounters> {
        self.inner
            .routes
            .entry(route_id.to_string())
            .or_default()
            .clone()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.inner.total_requests.load(Ordering::Relaxed);
        let latency_us = self.inner.total_latency_us.load(Ordering::Relaxed);
        MetricsSnapshot {
            total_requests: total,
            successful: self.inner.successful.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            status_2xx: self.inner.status_2xx.load(Ordering::Relaxed),
            status_3xx: self.inner.status_3xx.load(Ordering::Relaxed),
            status_4xx: self.inner.status_4xx.load(Ordering::Relaxed),
            status_5xx: self.inner.status_5xx.load(Ordering::Relaxed),
            active_connections: self.inner.active_connections.load(Ordering::Relaxed),
            average_latency_ms: if total == 0 {
                0.0
            } else {
                latency_us as f64 / total as f64 / 1000.0
            },
            routes: self
                .inner
                .routes
                .iter()
                .map(|e| (e.key().clone(), e.value().snapshot()))
                .collect(),
        }
    }
}
