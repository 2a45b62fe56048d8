//! Fingerprinted response cache with single-flight fill.
//!
//! The fingerprint is SHA-256 over (method, canonical URL, sorted vary
//! header values). Only 2xx responses without `Cache-Control: no-store` are
//! stored. Concurrent misses for one fingerprint coalesce: the first caller
//! becomes the leader and fills the cache, late arrivals wait on a watch
//! handle and read the published result. Entries expire by TTL and the store
//! is capped by an LRU bound; a background sweeper removes expired entries.

use actix_web::http::header::HeaderMap;
use actix_web::http::StatusCode;
use bytes::Bytes;
use dashmap::DashMap;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl", with = "crate::utils::duration_fmt")]
    pub ttl: Duration,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Request headers whose values participate in the fingerprint.
    #[serde(default)]
    pub vary_headers: Vec<String>,
}

fn default_ttl() -> Duration {
    Duration::from_secs(60)
}

fn default_max_entries() -> usize {
    1024
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.ttl.is_zero() {
            return Err("cache ttl must be greater than 0".to_string());
        }
        if self.max_entries == 0 {
            return Err("cache max_entries must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// One stored artifact.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// `Content-Encoding` the body was stored with.
    pub content_encoding: Option<String>,
    pub expires_at: Instant,
}

impl CachedResponse {
    pub fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug, Clone)]
enum FillState {
    Pending,
    Done(Option<CachedResponse>),
}

/// Position of a caller in the single-flight protocol.
pub enum Fill {
    /// First caller for the fingerprint: perform the origin request and
    /// publish through the guard.
    Leader(FillGuard),
    /// Another fill is in flight; await the published result.
    Follower(watch::Receiver<FillState>),
}

/// Leader handle. Publishing (or dropping without a result) releases the
/// waiters and removes the pending entry.
pub struct FillGuard {
    fingerprint: String,
    cache: Arc<ResponseCache>,
    tx: watch::Sender<FillState>,
    published: bool,
}

impl FillGuard {
    /// Publishes the origin outcome to all waiters; stores it when present.
    pub fn publish(mut self, response: Option<CachedResponse>) {
        if let Some(ref resp) = response {
            self.cache.insert(&self.fingerprint, resp.clone());
        }
        let _ = self.tx.send(FillState::Done(response));
        self.cache.pending.remove(&self.fingerprint);
        self.published = true;
    }
}

impl Drop for FillGuard {
    fn drop(&mut self) {
        if !self.published {
            let _ = self.tx.send(FillState::Done(None));
            self.cache.pending.remove(&self.fingerprint);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub entries: usize,
    pub coalesced: u64,
}

pub struct ResponseCache {
    config: CacheConfig,
    store: Mutex<LruCache<String, CachedResponse>>,
    pending: DashMap<String, watch::Receiver<FillState>>,
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    coalesced: AtomicU64,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Arc<Self> {
        let cap = NonZeroUsize::new(config.max_entries.max(1)).expect("non-zero capacity");
        Arc::new(Self {
            config,
            store: Mutex::new(LruCache::new(cap)),
            pending: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            insertions: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// SHA-256 fingerprint over method, canonical URL and sorted vary
    /// header values.
    pub fn fingerprint(&self, method: &str, path: &str, query: &str, headers: &HeaderMap) -> String {
        let mut hasher = Sha256::new();
        hasher.update(method.as_bytes());
        hasher.update(b"\n");
        hasher.update(canonical_url(path, query).as_bytes());
        hasher.update(b"\n");
        let mut vary_values: Vec<String> = self
            .config
            .vary_headers
            .iter()
            .map(|name| {
                let value = headers
                    .get(name.as_str())
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");
                format!("{}={}", name.to_ascii_lowercase(), value)
            })
            .collect();
        vary_values.sort();
        for value in vary_values {
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    /// Fresh cached response for the fingerprint, if any.
    pub fn lookup(&self, fingerprint: &str) -> Option<CachedResponse> {
        let mut store = self.store.lock().expect("cache store lock");
        match store.get(fingerprint) {
            Some(entry) if entry.is_fresh() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            }
            Some(_) => {
                store.pop(fingerprint);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Joins the single-flight group for a fingerprint.
    pub fn begin_fill(self: &Arc<Self>, fingerprint: &str) -> Fill {
        match self.pending.entry(fingerprint.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                Fill::Follower(entry.get().clone())
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let (tx, rx) = watch::channel(FillState::Pending);
                slot.insert(rx);
                Fill::Leader(FillGuard {
                    fingerprint: fingerprint.to_string(),
                    cache: Arc::clone(self),
                    tx,
                    published: false,
                })
            }
        }
    }

    /// Follower side: waits until the leader publishes. `None` means the
    /// leader failed or the response was not cacheable; the follower then
    /// performs its own origin request.
    pub async fn await_fill(mut rx: watch::Receiver<FillState>) -> Option<CachedResponse> {
        loop {
            if let FillState::Done(result) = rx.borrow().clone() {
                return result;
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Whether a response may enter the cache.
    pub fn is_storable(status: StatusCode, cache_control: Option<&str>) -> bool {
        if !status.is_success() {
            return false;
        }
        match cache_control {
            Some(value) => !value.to_ascii_lowercase().contains("no-store"),
            None => true,
        }
    }

    fn insert(&self, fingerprint: &str, response: CachedResponse) {
        self.insertions.fetch_add(1, Ordering::Relaxed);
        let mut store = self.store.lock().expect("cache store lock");
        store.put(fingerprint.to_string(), response);
    }

    /// Removes expired entries; driven by the route's sweeper task.
    pub fn sweep(&self) {
        let mut store = self.store.lock().expect("cache store lock");
        let expired: Vec<String> = store
            .iter()
            .filter(|(_, entry)| !entry.is_fresh())
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            store.pop(&key);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            entries: self.store.lock().expect("cache store lock").len(),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }
}

/// Path plus query with the query pairs sorted, so parameter order does not
/// split the cache.
fn canonical_url(path: &str, query: &str) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let mut pairs: Vec<&str> = query.split('&').collect();
    pairs.sort_unstable();
    format!("{}?{}", path, pairs.join("&"))
}
