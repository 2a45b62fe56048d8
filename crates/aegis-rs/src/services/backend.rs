//! Runtime state of a single backend.
//!
//! The configuration half lives in [`crate::models::route::Backend`]; this
//! wrapper adds the mutable pieces the balancers and the health checker
//! share: health, EWMA latency, in-flight and failure counters. All fields
//! are atomics so the hot path never locks.

use crate::models::route::Backend;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Backend liveness as reported by the health checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Passing = 0,
    /// One failed probe; still eligible for traffic.
    Warning = 1,
    /// Repeated failed probes; excluded from selection.
    Critical = 2,
}

impl From<u8> for HealthState {
    fn from(value: u8) -> Self {
        match value {
            0 => HealthState::Passing,
            1 => HealthState::Warning,
            _ => HealthState::Critical,
        }
    }
}

/// EWMA smoothing factor for response latency.
pub const LATENCY_ALPHA: f64 = 0.2;

/// Samples required before least-response-time trusts the EWMA.
pub const WARMUP_SAMPLES: u64 = 10;

#[derive(Debug)]
pub struct BackendState {
    pub config: Backend,
    health: AtomicU8,
    in_flight: AtomicUsize,
    /// EWMA latency in microseconds, stored as f64 bits.
    ewma_us: AtomicU64,
    samples: AtomicU64,
    probe_failures: AtomicU32,
}

impl BackendState {
    pub fn new(config: Backend) -> Arc<Self> {
        Arc::new(Self {
            config,
            health: AtomicU8::new(HealthState::Passing as u8),
            in_flight: AtomicUsize::new(0),
            ewma_us: AtomicU64::new(0f64.to_bits()),
            samples: AtomicU64::new(0),
            probe_failures: AtomicU32::new(0),
        })
    }

    pub fn key(&self) -> String {
        self.config.key()
    }

    pub fn health(&self) -> HealthState {
        HealthState::from(self.health.load(Ordering::Relaxed))
    }

    /// Critical backends are filtered out before selection.
    pub fn is_healthy(&self) -> bool {
        self.health() != HealthState::Critical
    }

    pub fn set_health(&self, state: HealthState) {
        self.health.store(state as u8, Ordering::Relaxed);
    }

    /// Health checker bookkeeping: one failure degrades to warning, two in
    /// a row to critical; a success restores passing.
    pub fn record_probe(&self, success: bool) {
        if success {
            self.probe_failures.store(0, Ordering::Relaxed);
            self.set_health(HealthState::Passing);
        } else {
            let failures = self.probe_failures.fetch_add(1, Ordering::Relaxed) + 1;
            self.set_health(if failures >= 2 {
                HealthState::Critical
            } else {
                HealthState::Warning
            });
        }
    }

    pub fn begin_request(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    pub fn end_request(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Feeds one completed-request latency into the EWMA.
    pub fn record_latency(&self, latency: Duration) {
        let us = latency.as_micros().max(1) as f64;
        self.samples.fetch_add(1, Ordering::Relaxed);
        let mut current = self.ewma_us.load(Ordering::Relaxed);
        loop {
            let prev = f64::from_bits(current);
            let next = if prev == 0.0 {
                us
            } else {
                prev * (1.0 - LATENCY_ALPHA) + us * LATENCY_ALPHA
            };
            match self.ewma_us.compare_exchange_weak(
                current,
                next.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn ewma_latency(&self) -> f64 {
        f64::from_bits(self.ewma_us.load(Ordering::Relaxed))
    }

    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> BackendSnapshot {
        BackendSnapshot {
            key: self.key(),
            weight: self.config.weight,
            health: self.health(),
            in_flight: self.in_flight(),
            ewma_latency_ms: self.ewma_latency() / 1000.0,
            samples: self.samples(),
        }
    }
}

/// Read-only view for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct BackendSnapshot {
    pub key: String,
    pub weight: u32,
    pub health: HealthState,
    pub in_flight: usize,
    pub ewma_latency_ms: f64,
    pub samples: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> Arc<BackendState> {
        BackendState::new(Backend {
            host: "http://b".to_string(),
            port: 8080,
            weight: 1,
            health_check_path: None,
        })
    }

    #[test]
    fn probe_transitions() {
        let b = backend();
        assert_eq!(b.health(), HealthState::Passing);
        b.record_probe(false);
        assert_eq!(b.health(), HealthState::Warning);
        assert!(b.is_healthy());
        b.record_probe(false);
        assert_eq!(b.health(), HealthState::Critical);
        assert!(!b.is_healthy());
        b.record_probe(true);
        assert_eq!(b.health(), HealthState::Passing);
    }

    #[test]
    fn ewma_converges_toward_samples() {
        let b = backend();
        for _ in 0..50 {
            b.record_latency(Duration::from_millis(10));
        }
        let ewma_ms = b.ewma_latency() / 1000.0;
        assert!((ewma_ms - 10.0).abs() < 1.0, "ewma was {}", ewma_ms);
    }

    #[test]
    fn in_flight_tracking() {
        let b = backend();
        b.begin_request();
        b.begin_request();
        assert_eq!(b.in_flight(), 2);
        b.end_request();
        assert_eq!(b.in_flight(), 1);
    }
}
