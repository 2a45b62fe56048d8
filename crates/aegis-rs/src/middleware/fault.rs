//! Probabilistic fault injection.
//!
//! Two independent dice per request: a delay and an abort. The delay die is
//! rolled and served first, then the abort die decides whether the request
//! dies with the configured status. Both at probability 0 make the stage a
//! no-op.

use actix_web::http::StatusCode;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Abort probability, integer percent 0..100.
    #[serde(default)]
    pub abort_percentage: u8,
    #[serde(default = "default_abort_status")]
    pub abort_status: u16,
    /// Delay probability, integer percent 0..100.
    #[serde(default)]
    pub delay_percentage: u8,
    #[serde(default = "default_delay", with = "crate::utils::duration_fmt")]
    pub delay: Duration,
}

fn default_abort_status() -> u16 {
    503
}

fn default_delay() -> Duration {
    Duration::from_millis(100)
}

impl FaultConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.abort_percentage > 100 || self.delay_percentage > 100 {
            return Err("fault percentages must be within 0..100".to_string());
        }
        if StatusCode::from_u16(self.abort_status).is_err() {
            return Err(format!("invalid fault abort status: {}", self.abort_status));
        }
        Ok(())
    }
}

/// The dice throw for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultOutcome {
    pub delay: Option<Duration>,
    pub abort: Option<StatusCode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FaultStats {
    pub delayed: u64,
    pub aborted: u64,
}

pub struct FaultInjector {
    config: FaultConfig,
    delayed: AtomicU64,
    aborted: AtomicU64,
}

impl FaultInjector {
    pub fn new(config: FaultConfig) -> Self {
        Self {
            config,
            delayed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
        }
    }

    /// Rolls both dice once. The caller applies the delay before honoring
    /// the abort.
    pub fn roll(&self) -> FaultOutcome {
        let mut rng = rand::thread_rng();
        self.roll_with(rng.gen_range(0..100), rng.gen_range(0..100))
    }

    fn roll_with(&self, delay_die: u8, abort_die: u8) -> FaultOutcome {
        let delay = if self.config.delay_percentage > 0 && delay_die < self.config.delay_percentage
        {
            self.delayed.fetch_add(1, Ordering::Relaxed);
            Some(self.config.delay)
        } else {
            None
        };
        let abort = if self.config.abort_percentage > 0 && abort_die < self.config.abort_percentage
        {
            self.aborted.fetch_add(1, Ordering::Relaxed);
            Some(StatusCode::from_u16(self.config.abort_status).unwrap_or(
                StatusCode::SERVICE_UNAVAILABLE,
            ))
        } else {
            None
        };
        FaultOutcome { delay, abort }
    }

    pub fn stats(&self) -> FaultStats {
        FaultStats {
            delayed: self.delayed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
        }
    }
}
