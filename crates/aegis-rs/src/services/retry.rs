//! Retry policy.
//!
//! A request is retried when its method is retryable, the upstream answered
//! with a retryable status (or died before producing one), and attempts
//! remain. Backoff is exponential with uniform jitter:
//! `min(max_backoff, initial * 2^(attempt-1)) * uniform(0.5, 1.5)`. Every
//! retry selects a fresh backend so one sick instance cannot poison the
//! attempt. POST and PATCH are retried only when explicitly enabled and the
//! body was fully buffered before the first attempt.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff", with = "crate::utils::duration_fmt")]
    pub initial_backoff: Duration,
    #[serde(default = "default_max_backoff", with = "crate::utils::duration_fmt")]
    pub max_backoff: Duration,
    /// Upstream statuses that trigger a retry.
    #[serde(default = "default_retryable_statuses")]
    pub retryable_statuses: Vec<u16>,
    /// Methods eligible for retries.
    #[serde(default = "default_retryable_methods")]
    pub retryable_methods: Vec<String>,
    /// Allow retrying POST/PATCH (requires a fully buffered body).
    #[serde(default)]
    pub retry_non_idempotent: bool,
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(100)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(5)
}

fn default_retryable_statuses() -> Vec<u16> {
    vec![502, 503, 504]
}

fn default_retryable_methods() -> Vec<String> {
    ["GET", "HEAD", "OPTIONS", "PUT", "DELETE"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
            retryable_statuses: default_retryable_statuses(),
            retryable_methods: default_retryable_methods(),
            retry_non_idempotent: false,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries > 10 {
            return Err("max_retries should not exceed 10".to_string());
        }
        if self.initial_backoff > self.max_backoff {
            return Err("initial_backoff cannot exceed max_backoff".to_string());
        }
        Ok(())
    }

    /// Whether this method may be retried at all.
    pub fn method_retryable(&self, method: &str, body_buffered: bool) -> bool {
        let non_idempotent = method.eq_ignore_ascii_case("POST") || method.eq_ignore_ascii_case("PATCH");
        if non_idempotent {
            return self.retry_non_idempotent
                && body_buffered
                && self
                    .retryable_methods
                    .iter()
                    .any(|m| m.eq_ignore_ascii_case(method));
        }
        self.retryable_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
    }

    pub fn status_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Jittered exponential backoff for attempt `n` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .initial_backoff
            .saturating_mul(1u32 << (attempt.saturating_sub(1)).min(16));
        let capped = exp.min(self.max_backoff);
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        capped.mul_f64(jitter)
    }
}

/// Requests, retries and eventual successes are counted separately.
#[derive(Debug, Default)]
pub struct RetryMetrics {
    requests: AtomicU64,
    retries: AtomicU64,
    successes: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrySnapshot {
    pub requests: u64,
    pub retries: u64,
    pub successes: u64,
}

impl RetryMetrics {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RetrySnapshot {
        RetrySnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
        }
    }
}
