//! Configuration hot reload.
//!
//! Two entry points funnel into the same validated atomic swap on
//! [`AppState`]: the admin `POST /reload` endpoint, and the optional file
//! watcher below which polls the config file's modification time. A failed
//! reload leaves the running configuration untouched.

use crate::routes::AppState;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;

/// Poll cadence for the mtime watcher.
const WATCH_INTERVAL: Duration = Duration::from_secs(5);

/// Spawns the file watcher; returns the handle that stops it.
pub fn spawn_watcher(state: Arc<AppState>) -> watch::Sender<bool> {
    let (tx, mut rx) = watch::channel(false);
    tokio::spawn(async move {
        let mut last_mtime = mtime_of(&state.config_path);
        let mut ticker = tokio::time::interval(WATCH_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let current = mtime_of(&state.config_path);
                    if let (Some(previous), Some(now)) = (last_mtime, current) {
                        if now > previous {
                            match state.reload_from_disk() {
                                Ok(version) => {
                                    log::info!("config file changed, reloaded as version {}", version);
                                }
                                Err(error) => {
                                    log::error!("config file changed but reload failed: {}", error);
                                }
                            }
                        }
                    }
                    last_mtime = current;
                }
                _ = rx.changed() => {
                    log::debug!("config watcher stopping");
                    return;
                }
            }
        }
    });
    tx
}

fn mtime_of(path: &str) -> Option<SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}
