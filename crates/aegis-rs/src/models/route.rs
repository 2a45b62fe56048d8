//! Route and backend configuration model.
//!
//! A route is a match spec (method set, exact path or prefix) plus the full
//! middleware configuration for requests it owns. Routes are created at load
//! or reload and replaced atomically; every optional section below maps to
//! one pipeline stage.

use crate::middleware::adaptive::AdaptiveConfig;
use crate::middleware::auth::{AuthConfig, AuthzConfig};
use crate::middleware::bandwidth::BandwidthConfig;
use crate::middleware::cache::CacheConfig;
use crate::middleware::compression::CompressionConfig;
use crate::middleware::cors::CorsConfig;
use crate::middleware::etag::EtagConfig;
use crate::middleware::fault::FaultConfig;
use crate::middleware::ip_filter::IpFilterConfig;
use crate::middleware::jmespath::JmesPathConfig;
use crate::middleware::mirror::MirrorConfig;
use crate::middleware::modifier::ModifierRule;
use crate::middleware::priority::PriorityRouteConfig;
use crate::middleware::quota::QuotaConfig;
use crate::middleware::rate_limit::RateLimitConfig;
use crate::middleware::signing::SigningConfig;
use crate::middleware::throttle::ThrottleConfig;
use crate::middleware::validation::ValidationConfig;
use crate::services::circuit_breaker::CircuitBreakerConfig;
use crate::services::retry::RetryConfig;
use crate::translator::TranslatorConfig;
use crate::utils::keys::{KeyPart, KeySpec};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Load balancing algorithm for a route's backend set.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancerKind {
    /// Atomic counter modulo healthy backends (default).
    RoundRobin,
    /// Smooth weighted round-robin with integer increments.
    WeightedRoundRobin,
    /// Fewest in-flight requests, ties broken round-robin.
    LeastConn,
    /// Lowest EWMA latency, round-robin during warm-up.
    LeastResponseTime,
    /// 150-virtual-node hash ring keyed by ip/header/query/cookie.
    ConsistentHash,
}

impl Default for LoadBalancerKind {
    fn default() -> Self {
        Self::RoundRobin
    }
}

/// One upstream server of a route.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Backend {
    /// Target host URL including protocol (http:// or https://).
    pub host: String,

    /// Target port number for the backend service.
    pub port: u16,

    /// Weight for weighted round-robin (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Health probe path; probed periodically when set.
    #[serde(default)]
    pub health_check_path: Option<String>,
}

fn default_weight() -> u32 {
    1
}

impl Backend {
    pub fn validate(&self) -> Result<(), String> {
        if !self.host.starts_with("http://") && !self.host.starts_with("https://") {
            return Err(format!(
                "backend host must start with http:// or https://: {}",
                self.host
            ));
        }
        if self.port == 0 {
            return Err("backend port must be between 1 and 65535".to_string());
        }
        if self.weight == 0 {
            return Err("backend weight must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Stable identity used for breakers and connection pools.
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A routing rule plus its full middleware configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Route {
    /// Stable identifier, unique across the configuration.
    pub id: String,

    /// Allowed HTTP methods; empty means every method.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Exact path or prefix to match.
    pub path: String,

    /// Prefix match instead of exact. Longest prefix wins; exact beats
    /// prefix.
    #[serde(default)]
    pub prefix: bool,

    /// Replacement for the matched path (or prefix) before forwarding.
    #[serde(default)]
    pub rewrite: Option<String>,

    #[serde(default)]
    pub backends: Vec<Backend>,

    #[serde(default)]
    pub load_balancer: LoadBalancerKind,

    /// Hash key for consistent hashing (`ip`, `header:`, `query:`,
    /// `cookie:`).
    #[serde(default)]
    pub hash_key: Option<KeySpec>,

    /// Upstream timeout for this route.
    #[serde(default = "default_timeout", with = "crate::utils::duration_fmt")]
    pub timeout: Duration,

    // Pipeline stages, in no particular order; execution always follows the
    // canonical pipeline order.
    #[serde(default)]
    pub ip_filter: Option<IpFilterConfig>,
    #[serde(default)]
    pub cors: Option<CorsConfig>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub authorization: Option<AuthzConfig>,
    #[serde(default)]
    pub validation: Option<ValidationConfig>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default)]
    pub quota: Option<QuotaConfig>,
    #[serde(default)]
    pub adaptive: Option<AdaptiveConfig>,
    #[serde(default)]
    pub priority: Option<PriorityRouteConfig>,
    #[serde(default)]
    pub throttle: Option<ThrottleConfig>,
    #[serde(default)]
    pub bandwidth: Option<BandwidthConfig>,
    #[serde(default)]
    pub fault: Option<FaultConfig>,
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
    #[serde(default)]
    pub modifiers: Vec<ModifierRule>,
    #[serde(default)]
    pub jmespath: Option<JmesPathConfig>,
    #[serde(default)]
    pub etag: Option<EtagConfig>,
    #[serde(default)]
    pub signing: Option<SigningConfig>,
    #[serde(default)]
    pub compression: Option<CompressionConfig>,
    #[serde(default)]
    pub mirror: Option<MirrorConfig>,
    #[serde(default)]
    pub translator: Option<TranslatorConfig>,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Route {
    /// Minimal exact-match route; handy programmatically and in tests.
    pub fn exact(id: &str, path: &str) -> Self {
        Self {
            id: id.to_string(),
            methods: Vec::new(),
            path: path.to_string(),
            prefix: false,
            rewrite: None,
            backends: Vec::new(),
            load_balancer: LoadBalancerKind::default(),
            hash_key: None,
            timeout: default_timeout(),
            ip_filter: None,
            cors: None,
            auth: None,
            authorization: None,
            validation: None,
            rate_limit: None,
            quota: None,
            adaptive: None,
            priority: None,
            throttle: None,
            bandwidth: None,
            fault: None,
            circuit_breaker: None,
            retry: None,
            cache: None,
            modifiers: Vec::new(),
            jmespath: None,
            etag: None,
            signing: None,
            compression: None,
            mirror: None,
            translator: None,
        }
    }

    pub fn allows_method(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("route id cannot be empty".to_string());
        }
        if !self.path.starts_with('/') {
            return Err(format!("route {} path must start with '/'", self.id));
        }
        const METHODS: &[&str] = &[
            "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "TRACE",
        ];
        for method in &self.methods {
            if !METHODS.iter().any(|m| method.eq_ignore_ascii_case(m)) {
                return Err(format!("route {} has invalid method: {}", self.id, method));
            }
        }
        if self.backends.is_empty() && self.translator.is_none() {
            return Err(format!("route {} has no backends", self.id));
        }
        for backend in &self.backends {
            backend
                .validate()
                .map_err(|e| format!("route {}: {}", self.id, e))?;
        }
        if self.load_balancer == LoadBalancerKind::ConsistentHash {
            let key = self.hash_key.as_ref().ok_or_else(|| {
                format!("route {} uses consistent_hash but has no hash_key", self.id)
            })?;
            for part in key.parts() {
                match part {
                    KeyPart::Ip | KeyPart::Header(_) | KeyPart::Query(_) | KeyPart::Cookie(_) => {}
                    other => {
                        return Err(format!(
                            "route {} hash_key does not support part {:?}",
                            self.id, other
                        ));
                    }
                }
            }
        }
        if self.timeout.is_zero() {
            return Err(format!("route {} timeout must be greater than 0", self.id));
        }

        if let Some(section) = &self.ip_filter {
            section.validate().map_err(|e| prefix(&self.id, e))?;
        }
        if let Some(section) = &self.auth {
            section.validate().map_err(|e| prefix(&self.id, e))?;
        }
        if let Some(section) = &self.rate_limit {
            section.validate().map_err(|e| prefix(&self.id, e))?;
        }
        if let Some(section) = &self.quota {
            section.validate().map_err(|e| prefix(&self.id, e))?;
        }
        if let Some(section) = &self.adaptive {
            section.validate().map_err(|e| prefix(&self.id, e))?;
        }
        if let Some(section) = &self.throttle {
            section.validate().map_err(|e| prefix(&self.id, e))?;
        }
        if let Some(section) = &self.bandwidth {
            section.validate().map_err(|e| prefix(&self.id, e))?;
        }
        if let Some(section) = &self.fault {
            section.validate().map_err(|e| prefix(&self.id, e))?;
        }
        if let Some(section) = &self.circuit_breaker {
            section.validate().map_err(|e| prefix(&self.id, e))?;
        }
        if let Some(section) = &self.retry {
            section.validate().map_err(|e| prefix(&self.id, e))?;
        }
        if let Some(section) = &self.cache {
            section.validate().map_err(|e| prefix(&self.id, e))?;
        }
        for rule in &self.modifiers {
            rule.validate().map_err(|e| prefix(&self.id, e))?;
        }
        if let Some(section) = &self.signing {
            section.validate().map_err(|e| prefix(&self.id, e))?;
        }
        if let Some(section) = &self.compression {
            section.validate().map_err(|e| prefix(&self.id, e))?;
        }
        if let Some(section) = &self.mirror {
            section.validate().map_err(|e| prefix(&self.id, e))?;
        }
        if let Some(section) = &self.translator {
            section.validate().map_err(|e| prefix(&self.id, e))?;
        }
        if self.authorization.is_some() && self.auth.is_none() {
            return Err(format!(
                "route {} has authorization rules but no auth section",
                self.id
            ));
        }
        Ok(())
    }
}

fn prefix(id: &str, e: String) -> String {
    format!("route {}: {}", id, e)
}
