//! Top-level gateway settings.
//!
//! The configuration file is parsed into this frozen object once at load
//! (and again on every reload); nothing mutates it afterwards.

use crate::middleware::priority::PriorityConfig;
use crate::models::route::Route;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Data-plane listener address.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ListenerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5900
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Admin-plane listener address, always separate from the data plane.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AdminSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_admin_port")]
    pub port: u16,
}

fn default_admin_port() -> u16 {
    5901
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_admin_port(),
        }
    }
}

/// Complete gateway configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Settings {
    /// Configuration schema version, currently `1`.
    pub version: u8,

    #[serde(default)]
    pub listener: ListenerSettings,

    #[serde(default)]
    pub admin: AdminSettings,

    /// Process-global priority admitter; routes opt in with their own
    /// priority section.
    #[serde(default)]
    pub priority: Option<PriorityConfig>,

    #[serde(default)]
    pub routes: Vec<Route>,
}

impl Settings {
    pub fn validate(&self) -> Result<(), String> {
        if self.version != 1 {
            return Err(format!("unsupported configuration version: {}", self.version));
        }
        if self.listener.port == self.admin.port && self.listener.host == self.admin.host {
            return Err("listener and admin must bind different addresses".to_string());
        }
        if let Some(priority) = &self.priority {
            priority.validate()?;
        }
        let mut seen = HashSet::new();
        for route in &self.routes {
            if !seen.insert(route.id.as_str()) {
                return Err(format!("duplicate route id: {}", route.id));
            }
            route.validate()?;
            if route.priority.is_some() && self.priority.is_none() {
                return Err(format!(
                    "route {} has a priority section but no global priority admitter is configured",
                    route.id
                ));
            }
        }
        Ok(())
    }
}
