//! Throttling with a bounded wait.
//!
//! A single token bucket per route. Unlike the rate limiter, a caller that
//! finds the bucket empty waits for a token up to `max_wait` before being
//! rejected with 503, smoothing bursts instead of bouncing them.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Sustained rate in requests per second.
    pub rate: u64,
    #[serde(default = "default_burst")]
    pub burst: u64,
    #[serde(default = "default_max_wait", with = "crate::utils::duration_fmt")]
    pub max_wait: Duration,
}

fn default_burst() -> u64 {
    1
}

fn default_max_wait() -> Duration {
    Duration::from_millis(500)
}

impl ThrottleConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.rate == 0 {
            return Err("throttle rate must be greater than 0".to_string());
        }
        if self.burst == 0 {
            return Err("throttle burst must be greater than 0".to_string());
        }
        Ok(())
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThrottleStats {
    pub admitted: u64,
    pub rejected: u64,
}

pub struct Throttle {
    config: ThrottleConfig,
    bucket: Mutex<Bucket>,
    admitted: AtomicU64,
    rejected: AtomicU64,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        let bucket = Bucket {
            tokens: config.burst as f64,
            last_refill: Instant::now(),
        };
        Self {
            config,
            bucket: Mutex::new(bucket),
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Takes a token, waiting up to `max_wait`. `Err` maps to 503.
    pub async fn acquire(&self) -> Result<(), ()> {
        let deadline = Instant::now() + self.config.max_wait;
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().expect("throttle bucket lock");
                let now = Instant::now();
                let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.config.rate as f64)
                    .min(self.config.burst as f64);
                bucket.last_refill = now;
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    self.admitted.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.config.rate as f64)
            };

            let now = Instant::now();
            if now + wait > deadline {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(());
            }
            tokio::time::sleep(wait).await;
        }
    }

    pub fn stats(&self) -> ThrottleStats {
        ThrottleStats {
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}
