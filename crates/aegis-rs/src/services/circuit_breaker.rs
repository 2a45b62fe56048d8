//! Circuit breaker for upstream protection.
//!
//! Three states per route (or per backend, configurable): CLOSED counts
//! consecutive request failures and trips to OPEN at the threshold; OPEN
//! rejects with 503 until its timeout passes, then HALF_OPEN admits a
//! bounded number of probes; enough consecutive probe successes close the
//! circuit, any probe failure reopens it. A request observes one state for
//! its whole lifecycle: admission hands out a permit and the outcome is
//! recorded against that permit.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive request failures that open the circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u64,
    /// Consecutive probe successes that close it again.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u64,
    /// Time the circuit stays open before probing.
    #[serde(default = "default_timeout", with = "crate::utils::duration_fmt")]
    pub timeout: Duration,
    /// Probe budget while half-open.
    #[serde(default = "default_half_open_requests")]
    pub half_open_requests: u64,
    /// Track one breaker per backend instead of one per route.
    #[serde(default)]
    pub per_backend: bool,
}

fn default_failure_threshold() -> u64 {
    5
}

fn default_success_threshold() -> u64 {
    3
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_half_open_requests() -> u64 {
    1
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout: default_timeout(),
            half_open_requests: default_half_open_requests(),
            per_backend: false,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 || self.success_threshold == 0 {
            return Err("breaker thresholds must be greater than 0".to_string());
        }
        if self.half_open_requests == 0 {
            return Err("breaker half_open_requests must be greater than 0".to_string());
        }
        if self.timeout.is_zero() {
            return Err("breaker timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u64,
    consecutive_successes: u64,
    opened_at: Option<Instant>,
    half_open_in_flight: u64,
}

/// Admission token. The state the request saw is fixed at admission time.
#[derive(Debug, Clone, Copy)]
pub struct BreakerPermit {
    observed: CircuitState,
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub successes: u64,
    pub failures: u64,
    pub rejections: u64,
}

pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: String, config: CircuitBreakerConfig) -> Arc<Self> {
        Arc::new(Self {
            name,
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                half_open_in_flight: 0,
            }),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Admission check. `Err` means the circuit rejected the request and it
    /// must be answered 503 without touching the backend.
    pub fn try_acquire(&self) -> Result<BreakerPermit, ()> {
        let mut inner = self.inner.lock().expect("breaker lock");
        match inner.state {
            CircuitState::Closed => Ok(BreakerPermit {
                observed: CircuitState::Closed,
            }),
            CircuitState::Open => {
                let expired = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.timeout)
                    .unwrap_or(true);
                if expired {
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    inner.half_open_in_flight = 1;
                    log::info!("circuit {} half-open, probing", self.name);
                    Ok(BreakerPermit {
                        observed: CircuitState::HalfOpen,
                    })
                } else {
                    self.rejections.fetch_add(1, Ordering::Relaxed);
                    Err(())
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight < self.config.half_open_requests {
                    inner.half_open_in_flight += 1;
                    Ok(BreakerPermit {
                        observed: CircuitState::HalfOpen,
                    })
                } else {
                    self.rejections.fetch_add(1, Ordering::Relaxed);
                    Err(())
                }
            }
        }
    }

    /// Records the request outcome: one call per admitted request.
    pub fn on_success(&self, permit: BreakerPermit) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().expect("breaker lock");
        match permit.observed {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                if inner.state == CircuitState::HalfOpen {
                    inner.consecutive_successes += 1;
                    if inner.consecutive_successes >= self.config.success_threshold {
                        inner.state = CircuitState::Closed;
                        inner.consecutive_failures = 0;
                        inner.consecutive_successes = 0;
                        inner.opened_at = None;
                        log::info!("circuit {} closed, service recovered", self.name);
                    }
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn on_failure(&self, permit: BreakerPermit) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().expect("breaker lock");
        match permit.observed {
            CircuitState::Closed => {
                if inner.state != CircuitState::Closed {
                    return;
                }
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.consecutive_successes = 0;
                    log::warn!(
                        "circuit {} opened after {} consecutive failures",
                        self.name,
                        inner.consecutive_failures
                    );
                }
            }
            CircuitState::HalfOpen => {
                // A failed probe reopens the circuit and restarts the clock.
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_in_flight = 0;
                inner.consecutive_successes = 0;
                log::warn!("circuit {} reopened by failed probe", self.name);
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker lock").state
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: self.state(),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
        }
    }
}

/// Route-level view: one breaker, or one per backend.
pub struct BreakerSet {
    config: CircuitBreakerConfig,
    route_breaker: Arc<CircuitBreaker>,
    backend_breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerSet {
    pub fn new(route_id: &str, config: CircuitBreakerConfig) -> Self {
        Self {
            route_breaker: CircuitBreaker::new(route_id.to_string(), config.clone()),
            backend_breakers: DashMap::new(),
            config,
        }
    }

    /// The breaker governing a request aimed at `backend_key`.
    pub fn breaker_for(&self, backend_key: &str) -> Arc<CircuitBreaker> {
        if !self.config.per_backend {
            return Arc::clone(&self.route_breaker);
        }
        self.backend_breakers
            .entry(backend_key.to_string())
            .or_insert_with(|| {
                CircuitBreaker::new(backend_key.to_string(), self.config.clone())
            })
            .clone()
    }

    pub fn snapshots(&self) -> Vec<(String, CircuitBreakerStats)> {
        if !self.config.per_backend {
            return vec![(
                self.route_breaker.name().to_string(),
                self.route_breaker.stats(),
            )];
        }
        self.backend_breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect()
    }
}
