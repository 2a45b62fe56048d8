//! Client key extraction for rate limiting, quota and consistent hashing.
//!
//! A key spec is a comma-separated list of parts; a single part is the common
//! case and a multi-part spec forms a composite key. Recognized parts:
//!
//! - `ip` - the client address
//! - `client_id` - `X-Client-Id` header, falling back to the `client_id`
//!   query parameter
//! - `header:<name>` - a request header value
//! - `cookie:<name>` - a cookie value
//! - `query:<name>` - a query parameter value
//! - `jwt_claim:<name>` - a claim from the validated JWT
//!
//! Extraction is pure: the same request always yields the same key.

use actix_web::http::header::HeaderMap;
use serde::{Deserialize, Serialize};

/// One segment of a key spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    Ip,
    ClientId,
    Header(String),
    Cookie(String),
    Query(String),
    JwtClaim(String),
}

impl KeyPart {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw == "ip" {
            return Ok(KeyPart::Ip);
        }
        if raw == "client_id" {
            return Ok(KeyPart::ClientId);
        }
        for (prefix, ctor) in [
            ("header:", KeyPart::Header as fn(String) -> KeyPart),
            ("cookie:", KeyPart::Cookie as fn(String) -> KeyPart),
            ("query:", KeyPart::Query as fn(String) -> KeyPart),
            ("jwt_claim:", KeyPart::JwtClaim as fn(String) -> KeyPart),
        ] {
            if let Some(name) = raw.strip_prefix(prefix) {
                if name.is_empty() {
                    return Err(format!("key part '{}' requires a non-empty name", raw));
                }
                return Ok(ctor(name.to_string()));
            }
        }
        Err(format!("unrecognized key part: '{}'", raw))
    }
}

/// A parsed key spec: one or more parts joined into a composite key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    parts: Vec<KeyPart>,
}

impl KeySpec {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let parts = raw
            .split(',')
            .map(KeyPart::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if parts.is_empty() {
            return Err("key spec must contain at least one part".to_string());
        }
        Ok(KeySpec { parts })
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    /// Extracts the key for a request. Missing parts resolve to an empty
    /// segment so the key function stays total and reproducible.
    pub fn extract(&self, source: &KeySource<'_>) -> String {
        let segments: Vec<String> = self
            .parts
            .iter()
            .map(|part| extract_part(part, source))
            .collect();
        segments.join("|")
    }
}

impl Serialize for KeySpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rendered: Vec<String> = self
            .parts
            .iter()
            .map(|p| match p {
                KeyPart::Ip => "ip".to_string(),
                KeyPart::ClientId => "client_id".to_string(),
                KeyPart::Header(n) => format!("header:{}", n),
                KeyPart::Cookie(n) => format!("cookie:{}", n),
                KeyPart::Query(n) => format!("query:{}", n),
                KeyPart::JwtClaim(n) => format!("jwt_claim:{}", n),
            })
            .collect();
        serializer.serialize_str(&rendered.join(","))
    }
}

impl<'de> Deserialize<'de> for KeySpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        KeySpec::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Borrowed view of the request parts a key spec can read.
pub struct KeySource<'a> {
    pub client_ip: &'a str,
    pub headers: &'a HeaderMap,
    pub query: &'a str,
    pub claims: Option<&'a serde_json::Value>,
}

impl<'a> KeySource<'a> {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        let raw = self.headers.get("cookie")?.to_str().ok()?;
        for pair in raw.split(';') {
            let mut it = pair.splitn(2, '=');
            let k = it.next()?.trim();
            if k == name {
                return Some(it.next().unwrap_or("").trim().to_string());
            }
        }
        None
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        for pair in self.query.split('&') {
            let mut it = pair.splitn(2, '=');
            if it.next() == Some(name) {
                return Some(it.next().unwrap_or("").to_string());
            }
        }
        None
    }

    pub fn claim(&self, name: &str) -> Option<String> {
        let claims = self.claims?;
        match claims.get(name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

fn extract_part(part: &KeyPart, source: &KeySource<'_>) -> String {
    match part {
        KeyPart::Ip => source.client_ip.to_string(),
        KeyPart::ClientId => source
            .header("x-client-id")
            .or_else(|| source.query_param("client_id"))
            .unwrap_or_default(),
        KeyPart::Header(name) => source.header(name).unwrap_or_default(),
        KeyPart::Cookie(name) => source.cookie(name).unwrap_or_default(),
        KeyPart::Query(name) => source.query_param(name).unwrap_or_default(),
        KeyPart::JwtClaim(name) => source.claim(name).unwrap_or_default(),
    }
}
