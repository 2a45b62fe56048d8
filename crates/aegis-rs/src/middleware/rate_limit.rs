//! Per-route rate limiting.
//!
//! Two algorithms, selected in configuration: a token bucket (capacity
//! `burst`, refill `rate` tokens/second) and a two-counter sliding window
//! with sub-second precision. Keys come from the shared key-spec grammar so
//! limits can be per-IP, per-header, per-cookie, per-claim or composite.
//!
//! Every decision carries the values for the `X-RateLimit-Limit`,
//! `X-RateLimit-Remaining` and `X-RateLimit-Reset` headers plus the
//! `Retry-After` hint used on 429 responses.

use crate::utils::keys::KeySpec;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitAlgorithm {
    TokenBucket,
    SlidingWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub algorithm: RateLimitAlgorithm,
    /// Sustained rate in requests per second (token bucket) or requests per
    /// `period` (sliding window).
    pub rate: u64,
    /// Bucket capacity; ignored by the sliding window.
    #[serde(default)]
    pub burst: u64,
    /// Sliding window period; ignored by the token bucket.
    #[serde(default = "default_period", with = "crate::utils::duration_fmt")]
    pub period: Duration,
    /// Key spec, e.g. `"ip"` or `"header:X-Api-Key"` or `"ip,cookie:session"`.
    #[serde(default = "default_key")]
    pub key: KeySpec,
}

fn default_period() -> Duration {
    Duration::from_secs(1)
}

fn default_key() -> KeySpec {
    KeySpec::parse("ip").expect("static key spec")
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.rate == 0 {
            return Err("rate limit rate must be greater than 0".to_string());
        }
        if self.algorithm == RateLimitAlgorithm::TokenBucket && self.burst == 0 {
            return Err("token bucket burst must be greater than 0".to_string());
        }
        if self.algorithm == RateLimitAlgorithm::SlidingWindow && self.period.is_zero() {
            return Err("sliding window period must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Value for `X-RateLimit-Limit`.
    pub limit: u64,
    /// Value for `X-RateLimit-Remaining`.
    pub remaining: u64,
    /// Seconds until the limit fully resets, for `X-RateLimit-Reset`.
    pub reset_after: u64,
    /// Seconds a rejected caller should wait, for `Retry-After`.
    pub retry_after: u64,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
struct Window {
    previous: u64,
    current: u64,
    window_start: Instant,
}

/// Counter snapshot exposed on the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStats {
    pub requests: u64,
    pub admitted: u64,
    pub rejected: u64,
    pub tracked_keys: usize,
}

/// One limiter instance per route.
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<String, Bucket>,
    windows: DashMap<String, Window>,
    requests: AtomicU64,
    admitted: AtomicU64,
    rejected: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
            windows: DashMap::new(),
            requests: AtomicU64::new(0),
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn key_spec(&self) -> &KeySpec {
        &self.config.key
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    /// Admission check at an explicit instant; the split keeps the
    /// algorithms testable without sleeping.
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let decision = match self.config.algorithm {
            RateLimitAlgorithm::TokenBucket => self.check_token_bucket(key, now),
            RateLimitAlgorithm::SlidingWindow => self.check_sliding_window(key, now),
        };
        if decision.allowed {
            self.admitted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
        decision
    }

    fn check_token_bucket(&self, key: &str, now: Instant) -> RateLimitDecision {
        let rate = self.config.rate as f64;
        let burst = self.config.burst as f64;

        let mut entry = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: burst,
            last_refill: now,
        });
        let elapsed = now
            .saturating_duration_since(entry.last_refill)
            .as_secs_f64();
        entry.tokens = (entry.tokens + elapsed * rate).min(burst);
        entry.last_refill = now;

        let allowed = entry.tokens >= 1.0;
        if allowed {
            entry.tokens -= 1.0;
        }
        let remaining = entry.tokens.floor().max(0.0) as u64;
        // Time until the next whole token is available.
        let deficit = (1.0 - entry.tokens).max(0.0);
        let retry_after = (deficit / rate).ceil().max(1.0) as u64;
        let reset_after = ((burst - entry.tokens) / rate).ceil() as u64;

        RateLimitDecision {
            allowed,
            limit: self.config.burst,
            remaining,
            reset_after,
            retry_after: if allowed { 0 } else { retry_after },
        }
    }

    fn check_sliding_window(&self, key: &str, now: Instant) -> RateLimitDecision {
        let period = self.config.period;
        let rate = self.config.rate;

        let mut entry = self.windows.entry(key.to_string()).or_insert_with(|| Window {
            previous: 0,
            current: 0,
            window_start: now,
        });

        // Shift expired periods forward; skipping more than one period
        // empties both counters.
        let mut elapsed = now.saturating_duration_since(entry.window_start);
        if elapsed >= period {
            let skipped = (elapsed.as_secs_f64() / period.as_secs_f64()).floor() as u32;
            entry.previous = if skipped == 1 { entry.current } else { 0 };
            entry.current = 0;
            entry.window_start += period * skipped;
            elapsed = now.saturating_duration_since(entry.window_start);
        }

        let fraction = elapsed.as_secs_f64() / period.as_secs_f64();
        let effective = entry.current as f64 + entry.previous as f64 * (1.0 - fraction);
        let allowed = effective < rate as f64;
        if allowed {
            entry.current += 1;
        }

        let remaining = (rate as f64 - effective - if allowed { 1.0 } else { 0.0 })
            .floor()
            .max(0.0) as u64;
        let to_window_end = period.saturating_sub(elapsed);
        let retry_after = to_window_end.as_secs_f64().ceil().max(1.0) as u64;

        RateLimitDecision {
            allowed,
            limit: rate,
            remaining,
            reset_after: retry_after,
            retry_after: if allowed { 0 } else { retry_after },
        }
    }

    /// Drops entries idle long enough to be fully refilled or expired.
    pub fn sweep(&self) {
        let now = Instant::now();
        let bucket_idle = Duration::from_secs_f64(
            (self.config.burst.max(1) as f64 / self.config.rate.max(1) as f64).ceil(),
        ) + Duration::from_secs(60);
        self.buckets
            .retain(|_, b| now.saturating_duration_since(b.last_refill) < bucket_idle);
        let window_idle = self.config.period * 2 + Duration::from_secs(60);
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.window_start) < window_idle);
    }

    pub fn stats(&self) -> RateLimitStats {
        RateLimitStats {
            requests: self.requests.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            tracked_keys: self.buckets.len() + self.windows.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket_limiter(rate: u64, burst: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            algorithm: RateLimitAlgorithm::TokenBucket,
            rate,
            burst,
            period: default_period(),
            key: default_key(),
        })
    }

    fn window_limiter(rate: u64, period: Duration) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            algorithm: RateLimitAlgorithm::SlidingWindow,
            rate,
            burst: 0,
            period,
            key: default_key(),
        })
    }

    #[test]
    fn token_bucket_admits_burst_then_rejects() {
        let limiter = bucket_limiter(5, 5);
        let t0 = Instant::now();
        for i in 0..5 {
            let d = limiter.check_at("client", t0);
            assert!(d.allowed, "request {} should pass", i + 1);
        }
        let sixth = limiter.check_at("client", t0);
        assert!(!sixth.allowed);
        assert_eq!(sixth.limit, 5);
        assert_eq!(sixth.remaining, 0);
        assert!(sixth.retry_after >= 1);
    }

    #[test]
    fn token_bucket_refills_over_time() {
        let limiter = bucket_limiter(2, 2);
        let t0 = Instant::now();
        assert!(limiter.check_at("k", t0).allowed);
        assert!(limiter.check_at("k", t0).allowed);
        assert!(!limiter.check_at("k", t0).allowed);
        // One second refills two tokens.
        let t1 = t0 + Duration::from_secs(1);
        assert!(limiter.check_at("k", t1).allowed);
        assert!(limiter.check_at("k", t1).allowed);
        assert!(!limiter.check_at("k", t1).allowed);
    }

    #[test]
    fn token_bucket_bound_holds() {
        // Admitted count over window T must stay <= burst + rate*T + 1.
        let limiter = bucket_limiter(10, 5);
        let t0 = Instant::now();
        let mut admitted = 0;
        for tick in 0..200 {
            let now = t0 + Duration::from_millis(tick * 10);
            if limiter.check_at("k", now).allowed {
                admitted += 1;
            }
        }
        // T = 2s, so the ceiling is 5 + 20 + 1.
        assert!(admitted <= 26, "admitted {} over the bound", admitted);
    }

    #[test]
    fn sliding_window_caps_rate_per_period() {
        let period = Duration::from_secs(10);
        let limiter = window_limiter(3, period);
        let t0 = Instant::now();
        assert!(limiter.check_at("k", t0).allowed);
        assert!(limiter.check_at("k", t0).allowed);
        assert!(limiter.check_at("k", t0).allowed);
        let d = limiter.check_at("k", t0);
        assert!(!d.allowed);
        assert_eq!(d.limit, 3);
        assert!(d.retry_after >= 1);
    }

    #[test]
    fn sliding_window_weights_previous_period() {
        let period = Duration::from_secs(10);
        let limiter = window_limiter(4, period);
        let t0 = Instant::now();
        for _ in 0..4 {
            assert!(limiter.check_at("k", t0).allowed);
        }
        // Half way into the next period the previous 4 weigh as 2, so two
        // more requests fit.
        let t_half = t0 + Duration::from_secs(15);
        assert!(limiter.check_at("k", t_half).allowed);
        assert!(limiter.check_at("k", t_half).allowed);
        assert!(!limiter.check_at("k", t_half).allowed);
    }

    #[test]
    fn keys_are_isolated() {
        let limiter = bucket_limiter(1, 1);
        let t0 = Instant::now();
        assert!(limiter.check_at("a", t0).allowed);
        assert!(!limiter.check_at("a", t0).allowed);
        assert!(limiter.check_at("b", t0).allowed);
    }

    #[test]
    fn stats_count_decisions() {
        let limiter = bucket_limiter(1, 1);
        let t0 = Instant::now();
        limiter.check_at("a", t0);
        limiter.check_at("a", t0);
        let stats = limiter.stats();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.admitted, 1);
        assert_eq!(stats.rejected, 1);
    }
}
