//! Gradient-based adaptive concurrency limiting.
//!
//! The limiter compares the smallest latency it has ever observed against an
//! exponentially weighted moving average. The gradient `g = min / ewma` sits
//! in (0, 1]: close to 1 means the route is as fast as it ever was, so the
//! limit grows by one; a small gradient means queueing, so the limit shrinks
//! multiplicatively to `max(min_limit, floor(limit * g))`. Requests beyond
//! the current limit are rejected with 503.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    #[serde(default = "default_min_limit")]
    pub min_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    #[serde(default = "default_initial_limit")]
    pub initial_limit: usize,
    /// Gradient below which the limit shrinks.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Latency smoothing factor in (0, 1].
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
    #[serde(default = "default_adjust_interval", with = "crate::utils::duration_fmt")]
    pub adjust_interval: Duration,
}

fn default_min_limit() -> usize {
    1
}

fn default_max_limit() -> usize {
    1000
}

fn default_initial_limit() -> usize {
    20
}

fn default_tolerance() -> f64 {
    0.7
}

fn default_smoothing() -> f64 {
    0.2
}

fn default_adjust_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            min_limit: default_min_limit(),
            max_limit: default_max_limit(),
            initial_limit: default_initial_limit(),
            tolerance: default_tolerance(),
            smoothing: default_smoothing(),
            adjust_interval: default_adjust_interval(),
        }
    }
}

impl AdaptiveConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_limit == 0 {
            return Err("adaptive min_limit must be at least 1".to_string());
        }
        if self.min_limit > self.max_limit {
            return Err("adaptive min_limit cannot exceed max_limit".to_string());
        }
        if !(0.0..=1.0).contains(&self.tolerance) {
            return Err("adaptive tolerance must be within 0..1".to_string());
        }
        if !(0.0..=1.0).contains(&self.smoothing) || self.smoothing == 0.0 {
            return Err("adaptive smoothing must be within (0, 1]".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdaptiveStats {
    pub limit: usize,
    pub in_flight: usize,
    pub ewma_latency_ms: f64,
    pub min_latency_ms: f64,
    pub samples: u64,
    pub rejected: u64,
}

/// Shared limiter state; one per route that enables adaptive concurrency.
pub struct AdaptiveLimiter {
    config: AdaptiveConfig,
    limit: AtomicUsize,
    in_flight: AtomicUsize,
    /// EWMA latency in microseconds, stored as f64 bits.
    ewma_us: AtomicU64,
    /// Smallest latency observed, microseconds.
    min_us: AtomicU64,
    samples: AtomicU64,
    rejected: AtomicU64,
}

/// Guard-style permit; latency is reported on release.
pub struct AdaptivePermit;

impl AdaptiveLimiter {
    pub fn new(config: AdaptiveConfig) -> Self {
        let initial = config
            .initial_limit
            .clamp(config.min_limit, config.max_limit);
        Self {
            config,
            limit: AtomicUsize::new(initial),
            in_flight: AtomicUsize::new(0),
            ewma_us: AtomicU64::new(0f64.to_bits()),
            min_us: AtomicU64::new(u64::MAX),
            samples: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn adjust_interval(&self) -> Duration {
        self.config.adjust_interval
    }

    /// Admission: fails when in-flight has reached the current limit.
    pub fn try_acquire(&self) -> Option<AdaptivePermit> {
        let limit = self.limit.load(Ordering::Relaxed);
        let result = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current < limit {
                    Some(current + 1)
                } else {
                    None
                }
            });
        match result {
            Ok(_) => Some(AdaptivePermit),
            Err(_) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Releases a permit and feeds the latency sample.
    pub fn release(&self, _permit: AdaptivePermit, latency: Duration) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        let us = latency.as_micros().max(1) as u64;

        self.min_us.fetch_min(us, Ordering::Relaxed);
        self.samples.fetch_add(1, Ordering::Relaxed);

        let alpha = self.config.smoothing;
        // Lossy CAS loop over the f64 bits; a lost race just drops a sample.
        let mut current = self.ewma_us.load(Ordering::Relaxed);
        loop {
            let prev = f64::from_bits(current);
            let next = if prev == 0.0 {
                us as f64
            } else {
                prev * (1.0 - alpha) + us as f64 * alpha
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

    /// One adjustment step. Called on every `adjust_interval` tick by the
    /// route's background worker.
    pub fn adjust(&self) {
        if self.samples.load(Ordering::Relaxed) == 0 {
            return;
        }
        let ewma = f64::from_bits(self.ewma_us.load(Ordering::Relaxed));
        let min = self.min_us.load(Ordering::Relaxed);
        if ewma <= 0.0 || min == u64::MAX {
            return;
        }
        let gradient = (min as f64 / ewma).min(1.0);
        let current = self.limit.load(Ordering::Relaxed);
        let next = if gradient >= self.config.tolerance {
            (current + 1).min(self.config.max_limit)
        } else {
            ((current as f64 * gradient).floor() as usize).max(self.config.min_limit)
        };
        if next != current {
            log::debug!(
                "adaptive limit {} -> {} (gradient {:.3})",
                current,
                next,
                gradient
            );
            self.limit.store(next, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> AdaptiveStats {
        let min = self.min_us.load(Ordering::Relaxed);
        AdaptiveStats {
            limit: self.limit.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            ewma_latency_ms: f64::from_bits(self.ewma_us.load(Ordering::Relaxed)) / 1000.0,
            min_latency_ms: if min == u64::MAX {
                0.0
            } else {
                min as f64 / 1000.0
            },
            samples: self.samples.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    pub fn current_limit(&self) -> usize {
        self.limit.load(Ordering::Relaxed)
    }
}
