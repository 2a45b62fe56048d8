//! Protocol translation.
//!
//! A translator converts an HTTP/JSON request into another wire protocol.
//! One translator instance is registered per protocol tag at load;
//! `http_to_grpc` is the implemented translator and owns a shared HTTP/2
//! connection pool plus a reflection-driven descriptor cache. The
//! `grpc_web` and `http_to_thrift` tags are recognized configuration
//! surface and rejected at load.

pub mod codec;
pub mod descriptor;
pub mod grpc;
pub mod rest;
pub mod status;

use crate::translator::rest::{compile_pattern, CompiledMapping};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslatorKind {
    HttpToGrpc,
    GrpcWeb,
    HttpToThrift,
}

/// Declarative REST-to-RPC mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestMapping {
    /// HTTP method the mapping answers to.
    pub http_method: String,
    /// Path pattern with `:param` or `{param}` placeholders.
    pub pattern: String,
    /// Fully qualified service, e.g. `echo.v1.EchoService`.
    pub service: String,
    pub method: String,
    /// Where the request body lands: `*` merges at the root, a field name
    /// nests it, absent ignores the body.
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(rename = "type")]
    pub kind: TranslatorKind,
    /// gRPC backend URL, scheme and authority.
    pub backend: String,
    /// Fixed target service, bypassing mapping and path resolution.
    #[serde(default)]
    pub service: Option<String>,
    /// Fixed target method; requires `service`.
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub mappings: Vec<RestMapping>,
    /// Descriptor cache lifetime for this route's backend.
    #[serde(default = "default_descriptor_ttl", with = "crate::utils::duration_fmt")]
    pub descriptor_ttl: Duration,
}

fn default_descriptor_ttl() -> Duration {
    Duration::from_secs(300)
}

impl TranslatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self.kind {
            TranslatorKind::HttpToGrpc => {}
            TranslatorKind::GrpcWeb => {
                return Err("translator type grpc_web is not supported".to_string());
            }
            TranslatorKind::HttpToThrift => {
                return Err("translator type http_to_thrift is not supported".to_string());
            }
        }
        if !self.backend.starts_with("http://") && !self.backend.starts_with("https://") {
            return Err(format!(
                "translator backend must start with http:// or https://: {}",
                self.backend
            ));
        }
        if self.method.is_some() && self.service.is_none() {
            return Err("translator fixed method requires a service".to_string());
        }
        for mapping in &self.mappings {
            compile_pattern(&mapping.pattern)
                .map_err(|e| format!("translator mapping '{}': {}", mapping.pattern, e))?;
            if mapping.service.is_empty() || mapping.method.is_empty() {
                return Err(format!(
                    "translator mapping '{}' needs service and method",
                    mapping.pattern
                ));
            }
        }
        Ok(())
    }

    /// Compiles the route's mappings once at load.
    pub fn compile_mappings(&self) -> Result<Vec<CompiledMapping>, String> {
        self.mappings
            .iter()
            .map(|m| {
                let (regex, params) = compile_pattern(&m.pattern)?;
                Ok(CompiledMapping {
                    http_method: m.http_method.to_ascii_uppercase(),
                    regex,
                    params,
                    service: m.service.clone(),
                    method: m.method.clone(),
                    body: m.body.clone(),
                })
            })
            .collect()
    }
}
