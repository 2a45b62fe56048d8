//! Comprehensive configuration validation.
//!
//! Collects every error and warning instead of stopping at the first, so a
//! broken config file is fixable in one pass. Errors block boot and reload;
//! warnings are logged and tolerated.

use crate::models::route::LoadBalancerKind;
use crate::models::settings::Settings;

#[derive(Debug, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate_comprehensive(settings: &Settings) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Err(error) = settings.validate() {
            errors.push(error);
        }

        for route in &settings.routes {
            if route.backends.len() > 1
                && route.load_balancer == LoadBalancerKind::RoundRobin
                && route.backends.iter().any(|b| b.weight > 1)
            {
                warnings.push(format!(
                    "route {}: backend weights are ignored by round_robin; use weighted_round_robin",
                    route.id
                ));
            }
            if route.backends.len() == 1 && route.load_balancer == LoadBalancerKind::ConsistentHash
            {
                warnings.push(format!(
                    "route {}: consistent_hash with a single backend is a no-op",
                    route.id
                ));
            }
            if route.cache.is_some() && route.translator.is_some() {
                warnings.push(format!(
                    "route {}: caching applies only to unary translator responses",
                    route.id
                ));
            }
            if route.retry.is_none() && route.circuit_breaker.is_some() {
                warnings.push(format!(
                    "route {}: circuit breaker without a retry policy trips on single failures",
                    route.id
                ));
            }
            if route
                .backends
                .iter()
                .all(|b| b.health_check_path.is_none())
                && route.backends.len() > 1
            {
                warnings.push(format!(
                    "route {}: multiple backends but no health_check_path; unhealthy instances keep receiving traffic",
                    route.id
                ));
            }
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}
