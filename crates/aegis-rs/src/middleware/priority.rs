//! Priority admission.
//!
//! One admitter per process guards a fixed number of concurrent slots.
//! Waiters queue in priority order (higher level first, FIFO within a
//! level) and give up with 503 after `max_wait`. A request's level comes
//! from the first matching rule of its route, or the route's default.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Process-global admitter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityConfig {
    pub max_concurrent: usize,
    #[serde(default = "default_max_wait", with = "crate::utils::duration_fmt")]
    pub max_wait: Duration,
}

fn default_max_wait() -> Duration {
    Duration::from_secs(5)
}

impl PriorityConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent == 0 {
            return Err("priority max_concurrent must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Per-route level derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityRouteConfig {
    #[serde(default)]
    pub rules: Vec<PriorityRule>,
    #[serde(default = "default_level")]
    pub default_level: u8,
}

fn default_level() -> u8 {
    1
}

/// First matching rule wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityRule {
    pub header: String,
    /// Exact value to match; absent means "header present".
    #[serde(default)]
    pub value: Option<String>,
    pub level: u8,
}

impl PriorityRouteConfig {
    pub fn level_for(&self, headers: &actix_web::http::header::HeaderMap) -> u8 {
        for rule in &self.rules {
            if let Some(found) = headers.get(&rule.header).and_then(|v| v.to_str().ok()) {
                match &rule.value {
                    Some(expected) if expected != found => continue,
                    _ => return rule.level,
                }
            }
        }
        self.default_level
    }
}

struct Waiter {
    level: u8,
    seq: u64,
    tx: oneshot::Sender<()>,
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level && self.seq == other.seq
    }
}

impl Eq for Waiter {}

impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Waiter {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap: higher level first, then earlier arrival.
        self.level
            .cmp(&other.level)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct State {
    available: usize,
    next_seq: u64,
    waiters: BinaryHeap<Waiter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriorityStats {
    pub max_concurrent: usize,
    pub available: usize,
    pub waiting: usize,
    pub admitted: u64,
    pub timed_out: u64,
}

/// The process-global semaphore with a priority-ordered wait queue.
pub struct PriorityAdmitter {
    max_concurrent: usize,
    max_wait: Duration,
    state: Mutex<State>,
    admitted: AtomicU64,
    timed_out: AtomicU64,
}

/// Held slot; released explicitly or on drop.
pub struct PriorityPermit {
    admitter: Arc<PriorityAdmitter>,
    released: bool,
}

impl PriorityPermit {
    pub fn release(mut self) {
        self.admitter.release_slot();
        self.released = true;
    }
}

impl Drop for PriorityPermit {
    fn drop(&mut self) {
        if !self.released {
            self.admitter.release_slot();
        }
    }
}

impl PriorityAdmitter {
    pub fn new(config: PriorityConfig) -> Arc<Self> {
        Arc::new(Self {
            max_concurrent: config.max_concurrent,
            max_wait: config.max_wait,
            state: Mutex::new(State {
                available: config.max_concurrent,
                next_seq: 0,
                waiters: BinaryHeap::new(),
            }),
            admitted: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
        })
    }

    /// Acquires a slot or waits up to `max_wait`; `Err` maps to 503.
    pub async fn acquire(self: &Arc<Self>, level: u8) -> Result<PriorityPermit, ()> {
        let mut rx = {
            let mut state = self.state.lock().expect("priority admitter lock");
            if state.available > 0 {
                state.available -= 1;
                self.admitted.fetch_add(1, Ordering::Relaxed);
                return Ok(PriorityPermit {
                    admitter: Arc::clone(self),
                    released: false,
                });
            }
            let (tx, rx) = oneshot::channel();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.waiters.push(Waiter { level, seq, tx });
            rx
        };

        match tokio::time::timeout(self.max_wait, &mut rx).await {
            Ok(Ok(())) => {
                self.admitted.fetch_add(1, Ordering::Relaxed);
                Ok(PriorityPermit {
                    admitter: Arc::clone(self),
                    released: false,
                })
            }
            _ => {
                // A grant can land in the instant the timeout fires; take
                // it rather than leaking the slot. Otherwise the dropped
                // receiver makes the queued sender fail, so a later
                // release skips this waiter.
                if rx.try_recv().is_ok() {
                    self.admitted.fetch_add(1, Ordering::Relaxed);
                    return Ok(PriorityPermit {
                        admitter: Arc::clone(self),
                        released: false,
                    });
                }
                self.timed_out.fetch_add(1, Ordering::Relaxed);
                Err(())
            }
        }
    }

    fn release_slot(&self) {
        let mut state = self.state.lock().expect("priority admitter lock");
        while let Some(waiter) = state.waiters.pop() {
            if waiter.tx.send(()).is_ok() {
                return;
            }
        }
        state.available = (state.available + 1).min(self.max_concurrent);
    }

    pub fn stats(&self) -> PriorityStats {
        let state = self.state.lock().expect("priority admitter lock");
        PriorityStats {
            max_concurrent: self.max_concurrent,
            available: state.available,
            waiting: state.waiters.len(),
            admitted: self.admitted.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}
