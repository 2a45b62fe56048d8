//! ETag generation and conditional 304 handling.
//!
//! Tags are a hex prefix of the body's SHA-256, quoted, with a `W/` prefix
//! in weak mode. Only successful responses with non-empty bodies are tagged.
//! `If-None-Match` accepts `*`, a single tag or a comma-separated list;
//! comparison is weak per RFC 7232 section 2.3.2.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EtagConfig {
    /// Emit weak validators (`W/"..."`).
    #[serde(default)]
    pub weak: bool,
}

/// Number of SHA-256 bytes kept in the rendered tag.
const TAG_BYTES: usize = 16;

/// Computes the ETag for a body. Deterministic: hashing the same bytes
/// always yields the same tag.
pub fn generate(body: &[u8], weak: bool) -> String {
    let digest = Sha256::digest(body);
    let tag = hex::encode(&digest[..TAG_BYTES]);
    if weak {
        format!("W/\"{}\"", tag)
    } else {
        format!("\"{}\"", tag)
    }
}

/// Evaluates `If-None-Match` against the response's tag.
pub fn matches(if_none_match: &str, etag: &str) -> bool {
    let if_none_match = if_none_match.trim();
    if if_none_match == "*" {
        return true;
    }
    let target = opaque_tag(etag);
    if_none_match
        .split(',')
        .map(|candidate| opaque_tag(candidate.trim()))
        .any(|candidate| candidate == target)
}

/// Strips the weak prefix, leaving the opaque quoted tag.
fn opaque_tag(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}
