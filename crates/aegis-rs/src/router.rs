//! Request routing.
//!
//! Resolves a method and path to at most one route. Exact matches beat
//! prefix matches; among prefixes the longest wins. A route only matches
//! when its method set allows the request method; anything unresolved is a
//! 404 upstream of here.

use crate::models::route::Route;
use crate::utils::path::join_rewrite;
use ahash::HashMap as AHashMap;
use ahash::HashMapExt;
use std::sync::Arc;

/// A resolved route plus the upstream path after rewriting.
#[derive(Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub upstream_path: String,
}

/// Immutable routing table, rebuilt on every reload.
pub struct RouteTable {
    exact: AHashMap<String, Vec<Arc<Route>>>,
    /// Prefix routes sorted by descending path length.
    prefixes: Vec<Arc<Route>>,
}

impl RouteTable {
    pub fn new(routes: &[Route]) -> Self {
        let mut exact: AHashMap<String, Vec<Arc<Route>>> = AHashMap::new();
        let mut prefixes: Vec<Arc<Route>> = Vec::new();
        for route in routes {
            let route = Arc::new(route.clone());
            if route.prefix {
                prefixes.push(route);
            } else {
                exact.entry(route.path.clone()).or_default().push(route);
            }
        }
        prefixes.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        Self { exact, prefixes }
    }

    pub fn len(&self) -> usize {
        self.exact.values().map(Vec::len).sum::<usize>() + self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Longest-prefix-wins resolution with exact matches taking priority.
    pub fn resolve(&self, method: &str, path: &str) -> Option<RouteMatch> {
        if let Some(candidates) = self.exact.get(path) {
            for route in candidates {
                if route.allows_method(method) {
                    let upstream_path = route
                        .rewrite
                        .clone()
                        .unwrap_or_else(|| path.to_string());
                    return Some(RouteMatch {
                        route: Arc::clone(route),
                        upstream_path,
                    });
                }
            }
        }

        for route in &self.prefixes {
            if !prefix_matches(&route.path, path) {
                continue;
            }
            if !route.allows_method(method) {
                continue;
            }
            let rest = &path[route.path.len()..];
            let upstream_path = match &route.rewrite {
                Some(rewrite) => join_rewrite(rewrite, rest),
                None => path.to_string(),
            };
            return Some(RouteMatch {
                route: Arc::clone(route),
                upstream_path,
            });
        }
        None
    }
}

/// `/api` matches `/api` and `/api/users`, never `/apix`.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    if !path.starts_with(prefix) {
        return false;
    }
    if path.len() == prefix.len() || prefix.ends_with('/') {
        return true;
    }
    path.as_bytes()[prefix.len()] == b'/'
}
