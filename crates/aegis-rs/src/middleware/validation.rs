//! Request validation stage.
//!
//! Runs before any body transformation so malformed input is rejected with
//! 400 and never reaches a backend.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// When non-empty, the request `Content-Type` must start with one of
    /// these values (parameters such as charset are ignored).
    #[serde(default)]
    pub allowed_content_types: Vec<String>,
    /// Require bodies with a JSON content type to parse as JSON.
    #[serde(default = "default_true")]
    pub require_valid_json: bool,
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_true() -> bool {
    true
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: default_max_body_bytes(),
            allowed_content_types: Vec::new(),
            require_valid_json: true,
        }
    }
}

/// Checks one request; `Err` carries the client-facing message.
pub fn validate_request(
    config: &ValidationConfig,
    content_type: Option<&str>,
    body: &Bytes,
) -> Result<(), String> {
    if body.len() > config.max_body_bytes {
        return Err(format!(
            "request body of {} bytes exceeds the limit of {} bytes",
            body.len(),
            config.max_body_bytes
        ));
    }

    let essence = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .unwrap_or_default();

    if !config.allowed_content_types.is_empty() && !body.is_empty() {
        let allowed = config
            .allowed_content_types
            .iter()
            .any(|a| essence.starts_with(&a.to_ascii_lowercase()));
        if !allowed {
            return Err(format!("unsupported content type: '{}'", essence));
        }
    }

    if config.require_valid_json && !body.is_empty() && is_json_content_type(&essence) {
        serde_json::from_slice::<serde_json::Value>(body)
            .map_err(|e| format!("malformed JSON body: {}", e))?;
    }

    Ok(())
}

fn is_json_content_type(essence: &str) -> bool {
    essence == "application/json" || essence == "text/json" || essence.ends_with("+json")
}
