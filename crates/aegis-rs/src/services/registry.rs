//! Per-route component registry.
//!
//! Maps route ids to the strongly-typed objects built for them at load:
//! limiters, quota, breakers, cache, modifier chain, signer, translator
//! wiring and the backend set. Lookups on the hot path are lock-free
//! (`ArcSwap` load); mutation happens only on reload, which swaps the whole
//! map atomically. Each entry owns its background workers (health checker,
//! adaptive adjuster, sweepers) and stops them through a watch channel when
//! the entry is dropped.

use crate::middleware::adaptive::AdaptiveLimiter;
use crate::middleware::auth::Authenticator;
use crate::middleware::cache::ResponseCache;
use crate::middleware::cors::Cors;
use crate::middleware::fault::FaultInjector;
use crate::middleware::ip_filter::IpFilter;
use crate::middleware::jmespath::JmesPathRewriter;
use crate::middleware::mirror::Mirror;
use crate::middleware::modifier::ModifierChain;
use crate::middleware::quota::QuotaEnforcer;
use crate::middleware::rate_limit::RateLimiter;
use crate::middleware::signing::ResponseSigner;
use crate::middleware::throttle::Throttle;
use crate::models::route::Route;
use crate::services::backend::BackendState;
use crate::services::circuit_breaker::BreakerSet;
use crate::services::health;
use crate::services::load_balancer::{LoadBalancer, LoadBalancerFactory};
use crate::services::metrics::{MetricsCollector, RouteCounters};
use crate::services::retry::RetryMetrics;
use crate::translator::grpc::GrpcTranslator;
use crate::translator::rest::CompiledMapping;
use ahash::HashMap as AHashMap;
use ahash::HashMapExt;
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Sweeper cadence for limiter, quota and cache housekeeping.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Translator wiring for one route.
pub struct RouteTranslator {
    pub shared: Arc<GrpcTranslator>,
    pub mappings: Vec<CompiledMapping>,
}

/// Everything built for one route at load time.
pub struct RouteComponents {
    pub route: Arc<Route>,
    pub backends: Vec<Arc<BackendState>>,
    pub balancer: Arc<dyn LoadBalancer>,
    pub counters: Arc<RouteCounters>,
    pub retry_metrics: Arc<RetryMetrics>,

    pub ip_filter: Option<IpFilter>,
    pub cors: Option<Cors>,
    pub authenticator: Option<Authenticator>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub quota: Option<Arc<QuotaEnforcer>>,
    pub adaptive: Option<Arc<AdaptiveLimiter>>,
    pub throttle: Option<Arc<Throttle>>,
    pub fault: Option<FaultInjector>,
    pub breakers: Option<Arc<BreakerSet>>,
    pub cache: Option<Arc<ResponseCache>>,
    pub modifiers: ModifierChain,
    pub jmespath: Option<JmesPathRewriter>,
    pub signer: Option<Arc<ResponseSigner>>,
    pub mirror: Option<Arc<Mirror>>,
    pub translator: Option<RouteTranslator>,

    /// Closing this stops every worker the entry spawned.
    shutdown: watch::Sender<bool>,
}

impl RouteComponents {
    pub fn build(
        route: Arc<Route>,
        metrics: &MetricsCollector,
        grpc: &Arc<GrpcTranslator>,
    ) -> Result<Arc<Self>, String> {
        let (shutdown, shutdown_rx) = watch::channel(false);

        let backends: Vec<Arc<BackendState>> = route
            .backends
            .iter()
            .cloned()
            .map(BackendState::new)
            .collect();
        let balancer = LoadBalancerFactory::create(
            route.load_balancer,
            &route.backends,
            route.hash_key.as_ref(),
        );

        let ip_filter = route
            .ip_filter
            .as_ref()
            .map(IpFilter::new)
            .transpose()
            .map_err(|e| format!("route {}: {}", route.id, e))?;
        let cors = route.cors.clone().map(Cors::new);
        let authenticator = route
            .auth
            .as_ref()
            .map(Authenticator::new)
            .transpose()
            .map_err(|e| format!("route {}: {}", route.id, e))?;
        let rate_limiter = route
            .rate_limit
            .clone()
            .map(|config| Arc::new(RateLimiter::new(config)));
        let quota = route
            .quota
            .clone()
            .map(|config| Arc::new(QuotaEnforcer::new(config)));
        let adaptive = route
            .adaptive
            .clone()
            .map(|config| Arc::new(AdaptiveLimiter::new(config)));
        let throttle = route
            .throttle
            .clone()
            .map(|config| Arc::new(Throttle::new(config)));
        let fault = route.fault.clone().map(FaultInjector::new);
        let breakers = route
            .circuit_breaker
            .clone()
            .map(|config| Arc::new(BreakerSet::new(&route.id, config)));
        let cache = route.cache.clone().map(ResponseCache::new);
        let modifiers = ModifierChain::new(route.modifiers.clone())
            .map_err(|e| format!("route {}: {}", route.id, e))?;
        let jmespath = route
            .jmespath
            .as_ref()
            .map(JmesPathRewriter::new)
            .transpose()
            .map_err(|e| format!("route {}: {}", route.id, e))?;
        let signer = route
            .signing
            .as_ref()
            .map(|config| ResponseSigner::new(config).map(Arc::new))
            .transpose()
            .map_err(|e| format!("route {}: {}", route.id, e))?;
        let mirror = route
            .mirror
            .clone()
            .map(Mirror::new)
            .transpose()
            .map_err(|e| format!("route {}: {}", route.id, e))?;
        let translator = route
            .translator
            .as_ref()
            .map(|config| {
                config.compile_mappings().map(|mappings| RouteTranslator {
                    shared: Arc::clone(grpc),
                    mappings,
                })
            })
            .transpose()
            .map_err(|e| format!("route {}: {}", route.id, e))?;

        let components = Arc::new(Self {
            counters: metrics.route(&route.id),
            retry_metrics: Arc::new(RetryMetrics::default()),
            backends,
            balancer,
            ip_filter,
            cors,
            authenticator,
            rate_limiter,
            quota,
            adaptive,
            throttle,
            fault,
            breakers,
            cache,
            modifiers,
            jmespath,
            signer,
            mirror,
            translator,
            shutdown,
            route,
        });

        components.spawn_workers(shutdown_rx);
        Ok(components)
    }

    fn spawn_workers(&self, shutdown: watch::Receiver<bool>) {
        health::spawn_checker(
            self.route.id.clone(),
            self.backends.clone(),
            shutdown.clone(),
        );

        if let Some(adaptive) = &self.adaptive {
            let adaptive = Arc::clone(adaptive);
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(adaptive.adjust_interval());
                loop {
                    tokio::select! {
                        _ = ticker.tick() => adaptive.adjust(),
                        _ = shutdown.changed() => return,
                    }
                }
            });
        }

        let rate_limiter = self.rate_limiter.clone();
        let quota = self.quota.clone();
        let cache = self.cache.clone();
        if rate_limiter.is_some() || quota.is_some() || cache.is_some() {
            let mut shutdown = shutdown;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if let Some(limiter) = &rate_limiter {
                                limiter.sweep();
                            }
                            if let Some(quota) = &quota {
                                quota.sweep();
                            }
                            if let Some(cache) = &cache {
                                cache.sweep();
                            }
                        }
                        _ = shutdown.changed() => return,
                    }
                }
            });
        }
    }

    /// Signals every worker to stop. Also happens implicitly when the
    /// entry is dropped.
    pub fn shutdown_workers(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Route-id -> components, swapped wholesale on reload.
pub struct PerRouteRegistry {
    entries: ArcSwap<AHashMap<String, Arc<RouteComponents>>>,
}

impl PerRouteRegistry {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(AHashMap::new()),
        }
    }

    /// Lock-free hot-path lookup.
    pub fn get(&self, route_id: &str) -> Option<Arc<RouteComponents>> {
        self.entries.load().get(route_id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<RouteComponents>> {
        self.entries.load().values().cloned().collect()
    }

    /// Builds components for every route and swaps the map in one step.
    /// Entries for removed routes get their workers stopped.
    pub fn install(
        &self,
        routes: &[Route],
        metrics: &MetricsCollector,
        grpc: &Arc<GrpcTranslator>,
    ) -> Result<(), String> {
        let mut next: AHashMap<String, Arc<RouteComponents>> = AHashMap::with_capacity(routes.len());
        for route in routes {
            let components = RouteComponents::build(Arc::new(route.clone()), metrics, grpc)?;
            next.insert(route.id.clone(), components);
        }
        let previous = self.entries.swap(Arc::new(next));
        for (id, components) in previous.iter() {
            if !self.entries.load().contains_key(id) {
                components.shutdown_workers();
            }
        }
        Ok(())
    }
}

impl Default for PerRouteRegistry {
    fn default() -> Self {
        Self::new()
    }
}
