//! Settings file loading.
//!
//! The gateway reads a JSON settings file; the path comes from
//! `AEGIS_CONFIG_PATH` (default `./config.json`). Schema-level validation
//! beyond serde lives in [`crate::config::validation`].

use crate::models::settings::Settings;
use std::fs;

pub const CONFIG_PATH_ENV: &str = "AEGIS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Path of the settings file for this process.
pub fn config_path() -> String {
    std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

/// Loads settings from the configured path.
pub fn load_settings() -> Result<Settings, String> {
    load_settings_from(&config_path())
}

/// Loads and parses one settings file.
pub fn load_settings_from(path: &str) -> Result<Settings, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("could not read config file {}: {}", path, e))?;
    serde_json::from_str(&raw).map_err(|e| format!("could not parse config file {}: {}", path, e))
}
