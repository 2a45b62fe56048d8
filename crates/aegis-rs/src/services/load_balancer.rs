//! Load balancing strategies for backend selection.
//!
//! Every selector filters unhealthy backends first; a request that finds no
//! healthy backend gets 503 upstream of here. Selection state (counters,
//! smooth weights, the hash ring) lives per route and survives for the
//! route's lifetime.

use crate::models::route::{Backend, LoadBalancerKind};
use crate::services::backend::{BackendState, WARMUP_SAMPLES};
use crate::utils::keys::KeySpec;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Virtual nodes per backend on the consistent-hash ring.
const VIRTUAL_NODES: usize = 150;

/// Selects one backend for a request.
///
/// `key` is only meaningful for consistent hashing; other strategies ignore
/// it.
pub trait LoadBalancer: Send + Sync {
    fn select(&self, backends: &[Arc<BackendState>], key: Option<&str>)
        -> Option<Arc<BackendState>>;
}

fn healthy(backends: &[Arc<BackendState>]) -> Vec<&Arc<BackendState>> {
    backends.iter().filter(|b| b.is_healthy()).collect()
}

/// Round-robin: atomic counter modulo healthy-backend count.
pub struct RoundRobinBalancer {
    counter: AtomicUsize,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobinBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for RoundRobinBalancer {
    fn select(
        &self,
        backends: &[Arc<BackendState>],
        _key: Option<&str>,
    ) -> Option<Arc<BackendState>> {
        let healthy = healthy(backends);
        if healthy.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % healthy.len();
        Some(Arc::clone(healthy[index]))
    }
}

/// Smooth weighted round-robin.
///
/// Each pick adds every backend's weight to its running current-weight,
/// selects the largest, then subtracts the total weight from the winner.
/// With weights A=3 B=1 the sequence is A A B A, not A A A B.
pub struct WeightedRoundRobinBalancer {
    current: Mutex<HashMap<String, i64>>,
}

impl WeightedRoundRobinBalancer {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for WeightedRoundRobinBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for WeightedRoundRobinBalancer {
    fn select(
        &self,
        backends: &[Arc<BackendState>],
        _key: Option<&str>,
    ) -> Option<Arc<BackendState>> {
        let healthy = healthy(backends);
        if healthy.is_empty() {
            return None;
        }
        let mut current = self.current.lock().expect("wrr state lock");
        let total: i64 = healthy.iter().map(|b| b.config.weight as i64).sum();
        let mut best: Option<(&Arc<BackendState>, i64)> = None;
        for &backend in healthy.iter() {
            let entry = current.entry(backend.key()).or_insert(0);
            *entry += backend.config.weight as i64;
            let weight = *entry;
            match best {
                Some((_, current_best)) if current_best >= weight => {}
                _ => best = Some((backend, weight)),
            }
        }
        let (winner, _) = best?;
        *current.entry(winner.key()).or_insert(0) -= total;
        Some(Arc::clone(winner))
    }
}

/// Least-connections with round-robin tie breaking.
pub struct LeastConnectionsBalancer {
    tie_breaker: AtomicUsize,
}

impl LeastConnectionsBalancer {
    pub fn new() -> Self {
        Self {
            tie_breaker: AtomicUsize::new(0),
        }
    }
}

impl Default for LeastConnectionsBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for LeastConnectionsBalancer {
    fn select(
        &self,
        backends: &[Arc<BackendState>],
        _key: Option<&str>,
    ) -> Option<Arc<BackendState>> {
        let healthy = healthy(backends);
        if healthy.is_empty() {
            return None;
        }
        let min = healthy.iter().map(|b| b.in_flight()).min()?;
        let tied: Vec<_> = healthy
            .into_iter()
            .filter(|b| b.in_flight() == min)
            .collect();
        let index = self.tie_breaker.fetch_add(1, Ordering::Relaxed) % tied.len();
        Some(Arc::clone(tied[index]))
    }
}

/// Least EWMA response time; falls back to round-robin until every healthy
/// backend has enough samples.
pub struct LeastResponseTimeBalancer {
    warmup: RoundRobinBalancer,
}

impl LeastResponseTimeBalancer {
    pub fn new() -> Self {
        Self {
            warmup: RoundRobinBalancer::new(),
        }
    }
}

impl Default for LeastResponseTimeBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for LeastResponseTimeBalancer {
    fn select(
        &self,
        backends: &[Arc<BackendState>],
        key: Option<&str>,
    ) -> Option<Arc<BackendState>> {
        let healthy = healthy(backends);
        if healthy.is_empty() {
            return None;
        }
        if healthy.iter().any(|b| b.samples() < WARMUP_SAMPLES) {
            return self.warmup.select(backends, key);
        }
        healthy
            .into_iter()
            .min_by(|a, b| {
                a.ewma_latency()
                    .partial_cmp(&b.ewma_latency())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(Arc::clone)
    }
}

/// Consistent hashing over a 64-bit ring with 150 virtual nodes per
/// backend.
///
/// The ring is built once from the route's backend set, so a repeated key
/// always lands on the same backend while that set is unchanged; adding or
/// removing a backend moves ~1/N of the keyspace. Lookup walks clockwise
/// from the key's hash and skips unhealthy backends.
pub struct ConsistentHashBalancer {
    ring: BTreeMap<u64, String>,
}

impl ConsistentHashBalancer {
    pub fn new(backends: &[Backend]) -> Self {
        let mut ring = BTreeMap::new();
        for backend in backends {
            let key = backend.key();
            for vnode in 0..VIRTUAL_NODES {
                ring.insert(hash_of(&format!("{}-{}", key, vnode)), key.clone());
            }
        }
        Self { ring }
    }

    fn walk(&self, from: u64) -> impl Iterator<Item = &String> {
        self.ring
            .range(from..)
            .map(|(_, v)| v)
            .chain(self.ring.range(..from).map(|(_, v)| v))
    }
}

impl LoadBalancer for ConsistentHashBalancer {
    fn select(
        &self,
        backends: &[Arc<BackendState>],
        key: Option<&str>,
    ) -> Option<Arc<BackendState>> {
        if self.ring.is_empty() {
            return None;
        }
        let by_key: HashMap<String, &Arc<BackendState>> = backends
            .iter()
            .filter(|b| b.is_healthy())
            .map(|b| (b.key(), b))
            .collect();
        if by_key.is_empty() {
            return None;
        }
        let point = hash_of(key.unwrap_or(""));
        for node in self.walk(point) {
            if let Some(backend) = by_key.get(node) {
                return Some(Arc::clone(backend));
            }
        }
        None
    }
}

fn hash_of(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Builds the balancer for a route.
pub struct LoadBalancerFactory;

impl LoadBalancerFactory {
    pub fn create(
        kind: LoadBalancerKind,
        backends: &[Backend],
        _hash_key: Option<&KeySpec>,
    ) -> Arc<dyn LoadBalancer> {
        match kind {
            LoadBalancerKind::RoundRobin => Arc::new(RoundRobinBalancer::new()),
            LoadBalancerKind::WeightedRoundRobin => Arc::new(WeightedRoundRobinBalancer::new()),
            LoadBalancerKind::LeastConn => Arc::new(LeastConnectionsBalancer::new()),
            LoadBalancerKind::LeastResponseTime => Arc::new(LeastResponseTimeBalancer::new()),
            LoadBalancerKind::ConsistentHash => Arc::new(ConsistentHashBalancer::new(backends)),
        }
    }
}
