//! Quota enforcement over calendar-aligned billing windows.
//!
//! Windows are computed in UTC by truncating to the unit boundary (month and
//! year lengths are not uniform, so boundaries are never derived by dividing
//! elapsed seconds). Per (route, key) the counter resets whenever the stored
//! window start differs from the current one.
//!
//! An optional shared counter can replace the in-process one for
//! multi-instance deployments; any failure talking to it admits the request
//! (fail open) and bumps a counter.

use crate::utils::keys::{KeyPart, KeySpec};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaPeriod {
    Hourly,
    Daily,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    pub limit: u64,
    pub period: QuotaPeriod,
    /// Key spec; quota accepts `ip`, `client_id`, `header:<name>` and
    /// `jwt_claim:<name>` parts.
    #[serde(default = "default_key")]
    pub key: KeySpec,
}

fn default_key() -> KeySpec {
    KeySpec::parse("ip").expect("static key spec")
}

impl QuotaConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.limit == 0 {
            return Err("quota limit must be greater than 0".to_string());
        }
        for part in self.key.parts() {
            match part {
                KeyPart::Ip | KeyPart::ClientId | KeyPart::Header(_) | KeyPart::JwtClaim(_) => {}
                other => {
                    return Err(format!("quota key does not support part {:?}", other));
                }
            }
        }
        Ok(())
    }
}

/// Start of the billing window containing `now`, in UTC.
pub fn window_start(period: QuotaPeriod, now: DateTime<Utc>) -> DateTime<Utc> {
    match period {
        QuotaPeriod::Hourly => Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), now.hour(), 0, 0)
            .unwrap(),
        QuotaPeriod::Daily => Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
            .unwrap(),
        QuotaPeriod::Monthly => Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .unwrap(),
        QuotaPeriod::Yearly => Utc.with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0).unwrap(),
    }
}

/// Exclusive end of the billing window containing `now`.
pub fn window_end(period: QuotaPeriod, now: DateTime<Utc>) -> DateTime<Utc> {
    let start = window_start(period, now);
    match period {
        QuotaPeriod::Hourly => start + chrono::Duration::hours(1),
        QuotaPeriod::Daily => start + chrono::Duration::days(1),
        QuotaPeriod::Monthly => {
            let (year, month) = if start.month() == 12 {
                (start.year() + 1, 1)
            } else {
                (start.year(), start.month() + 1)
            };
            Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()
        }
        QuotaPeriod::Yearly => Utc.with_ymd_and_hms(start.year() + 1, 1, 1, 0, 0, 0).unwrap(),
    }
}

/// Optional external counter shared across gateway instances.
#[async_trait]
pub trait SharedCounter: Send + Sync {
    /// Increments and returns the count for (key, window_start).
    async fn increment(&self, key: &str, window_start: i64) -> Result<u64, String>;
}

#[derive(Debug, Clone, Copy)]
struct QuotaEntry {
    count: u64,
    window_start: i64,
}

/// Decision for one request, carrying the `X-Quota-*` header values.
#[derive(Debug, Clone, Copy)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Unix seconds at window end, for `X-Quota-Reset`.
    pub reset: i64,
    /// `Retry-After` on rejection: ceil(seconds until window end) + 1.
    pub retry_after: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotaStats {
    pub requests: u64,
    pub admitted: u64,
    pub rejected: u64,
    pub fail_open: u64,
    pub tracked_keys: usize,
}

/// One enforcer per route.
pub struct QuotaEnforcer {
    config: QuotaConfig,
    entries: DashMap<String, QuotaEntry>,
    shared: Option<Arc<dyn SharedCounter>>,
    requests: AtomicU64,
    admitted: AtomicU64,
    rejected: AtomicU64,
    fail_open: AtomicU64,
}

impl QuotaEnforcer {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            shared: None,
            requests: AtomicU64::new(0),
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            fail_open: AtomicU64::new(0),
        }
    }

    pub fn with_shared_counter(mut self, shared: Arc<dyn SharedCounter>) -> Self {
        self.shared = Some(shared);
        self
    }

    pub fn key_spec(&self) -> &KeySpec {
        &self.config.key
    }

    pub async fn check(&self, key: &str) -> QuotaDecision {
        self.check_at(key, Utc::now()).await
    }

    /// Admission at an explicit clock reading, for deterministic tests.
    pub async fn check_at(&self, key: &str, now: DateTime<Utc>) -> QuotaDecision {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let start = window_start(self.config.period, now).timestamp();
        let end = window_end(self.config.period, now);

        let count = match &self.shared {
            Some(shared) => match shared.increment(key, start).await {
                Ok(count) => count,
                Err(err) => {
                    // Broken shared counter must not take traffic down.
                    log::warn!("quota shared counter failed, admitting request: {}", err);
                    self.fail_open.fetch_add(1, Ordering::Relaxed);
                    self.admitted.fetch_add(1, Ordering::Relaxed);
                    return QuotaDecision {
                        allowed: true,
                        limit: self.config.limit,
                        remaining: self.config.limit,
                        reset: end.timestamp(),
                        retry_after: 0,
                    };
                }
            },
            None => {
                let mut entry = self
                    .entries
                    .entry(key.to_string())
                    .or_insert(QuotaEntry {
                        count: 0,
                        window_start: start,
                    });
                if entry.window_start != start {
                    entry.count = 0;
                    entry.window_start = start;
                }
                entry.count += 1;
                entry.count
            }
        };

        let allowed = count <= self.config.limit;
        let remaining = self.config.limit.saturating_sub(count);
        let until_end = (end - now).num_milliseconds().max(0) as f64 / 1000.0;
        let retry_after = until_end.ceil() as u64 + 1;

        if allowed {
            self.admitted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }

        QuotaDecision {
            allowed,
            limit: self.config.limit,
            remaining,
            reset: end.timestamp(),
            retry_after: if allowed { 0 } else { retry_after },
        }
    }

    /// Purges entries whose window has passed. Driven by the per-route
    /// sweeper task once a minute.
    pub fn sweep(&self) {
        self.sweep_at(Utc::now());
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) {
        let current = window_start(self.config.period, now).timestamp();
        self.entries.retain(|_, e| e.window_start == current);
    }

    pub fn stats(&self) -> QuotaStats {
        QuotaStats {
            requests: self.requests.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            fail_open: self.fail_open.load(Ordering::Relaxed),
            tracked_keys: self.entries.len(),
        }
    }
}
