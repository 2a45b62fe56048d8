//! Backend health checking.
//!
//! One prober task per route, owned by the route's registry entry and
//! stopped through its shutdown channel. Backends without a
//! `health_check_path` stay passing forever.

use crate::services::backend::BackendState;
use crate::utils::path::format_target;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Probe cadence.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Per-probe timeout, well under the cadence.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Spawns the prober loop for a route's backends.
pub fn spawn_checker(
    route_id: String,
    backends: Vec<Arc<BackendState>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let probed: Vec<Arc<BackendState>> = backends
        .into_iter()
        .filter(|b| b.config.health_check_path.is_some())
        .collect();
    if probed.is_empty() {
        return;
    }
    let client = match Client::builder().timeout(PROBE_TIMEOUT).build() {
        Ok(client) => client,
        Err(err) => {
            log::error!("health checker for {} failed to start: {}", route_id, err);
            return;
        }
    };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CHECK_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for backend in &probed {
                        probe(&client, backend).await;
                    }
                }
                _ = shutdown.changed() => {
                    log::debug!("health checker for {} stopping", route_id);
                    return;
                }
            }
        }
    });
}

async fn probe(client: &Client, backend: &Arc<BackendState>) {
    let path = backend
        .config
        .health_check_path
        .as_deref()
        .unwrap_or("/health");
    let url = format_target(&backend.config.host, backend.config.port, path);
    let healthy = matches!(client.get(&url).send().await, Ok(resp) if resp.status().is_success());
    let before = backend.health();
    backend.record_probe(healthy);
    let after = backend.health();
    if before != after {
        log::info!(
            "backend {} health {:?} -> {:?}",
            backend.key(),
            before,
            after
        );
    }
}
