//! Traffic mirroring.
//!
//! Dispatches a copy of the request to a mirror target after the primary
//! response has been flushed. Mirror work runs on its own task and can
//! neither delay nor fail the client response. The sampling gate is rolled
//! once per request; the mirrored body is an independent copy of the
//! buffered request body.

use actix_web::http::Method;
use bytes::Bytes;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Base URL of the mirror target, scheme and authority included.
    pub target: String,
    /// Percentage of requests mirrored, integer 0..100.
    #[serde(default = "default_sample")]
    pub sample_percentage: u8,
    #[serde(default = "default_timeout", with = "crate::utils::duration_fmt")]
    pub timeout: Duration,
}

fn default_sample() -> u8 {
    100
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

impl MirrorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.target.starts_with("http://") && !self.target.starts_with("https://") {
            return Err(format!(
                "mirror target must start with http:// or https://: {}",
                self.target
            ));
        }
        if self.sample_percentage > 100 {
            return Err("mirror sample_percentage must be within 0..100".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MirrorStats {
    pub sampled: u64,
    pub skipped: u64,
    pub failed: u64,
}

pub struct Mirror {
    config: MirrorConfig,
    client: Client,
    sampled: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl Mirror {
    pub fn new(config: MirrorConfig) -> Result<Arc<Self>, String> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| format!("mirror client build failed: {}", e))?;
        Ok(Arc::new(Self {
            config,
            client,
            sampled: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }))
    }

    pub fn target(&self) -> &str {
        &self.config.target
    }

    /// Rolls the sampling die. Called exactly once per request.
    pub fn should_sample(&self) -> bool {
        let hit = match self.config.sample_percentage {
            0 => false,
            100 => true,
            pct => rand::thread_rng().gen_range(0..100) < pct,
        };
        if hit {
            self.sampled.fetch_add(1, Ordering::Relaxed);
        } else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    /// Fires the mirror copy on a detached task.
    pub fn dispatch(
        self: &Arc<Self>,
        method: Method,
        path_and_query: String,
        headers: Vec<(String, String)>,
        body: Bytes,
    ) {
        let mirror = Arc::clone(self);
        tokio::spawn(async move {
            let url = format!(
                "{}{}",
                mirror.config.target.trim_end_matches('/'),
                path_and_query
            );
            let method = reqwest::Method::from_bytes(method.as_str().as_bytes())
                .unwrap_or(reqwest::Method::GET);
            let mut request = mirror.client.request(method, &url).body(body.to_vec());
            for (name, value) in &headers {
                request = request.header(name, value);
            }
            if let Err(err) = request.send().await {
                mirror.failed.fetch_add(1, Ordering::Relaxed);
                log::debug!("mirror request to {} failed: {}", url, err);
            }
        });
    }

    pub fn stats(&self) -> MirrorStats {
        MirrorStats {
            sampled: self.sampled.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
