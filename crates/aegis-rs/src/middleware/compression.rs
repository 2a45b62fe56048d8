//! Response compression.
//!
//! Gzip-compresses buffered response bodies when the client accepts it and
//! the body is large enough to be worth the cycles. Runs late in the
//! response phase so the cache can store the encoded body together with its
//! `Content-Encoding`.

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Bodies below this size are left alone.
    #[serde(default = "default_min_bytes")]
    pub min_bytes: usize,
    /// flate2 level 0..9.
    #[serde(default = "default_level")]
    pub level: u32,
}

fn default_min_bytes() -> usize {
    1024
}

fn default_level() -> u32 {
    6
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            min_bytes: default_min_bytes(),
            level: default_level(),
        }
    }
}

impl CompressionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.level > 9 {
            return Err("compression level must be within 0..9".to_string());
        }
        Ok(())
    }
}

/// Whether the request advertises gzip support.
pub fn accepts_gzip(accept_encoding: Option<&str>) -> bool {
    accept_encoding
        .map(|v| {
            v.split(',')
                .any(|enc| enc.trim().split(';').next().unwrap_or("").trim() == "gzip")
        })
        .unwrap_or(false)
}

/// Compresses `body` when all gates pass; `None` means leave the response
/// untouched.
pub fn maybe_compress(
    config: &CompressionConfig,
    accept_encoding: Option<&str>,
    existing_encoding: Option<&str>,
    body: &Bytes,
) -> Option<Bytes> {
    if body.len() < config.min_bytes {
        return None;
    }
    if existing_encoding.is_some_and(|e| !e.eq_ignore_ascii_case("identity")) {
        return None;
    }
    if !accepts_gzip(accept_encoding) {
        return None;
    }
    let mut encoder = GzEncoder::new(
        Vec::with_capacity(body.len() / 2),
        Compression::new(config.level),
    );
    encoder.write_all(body).ok()?;
    let compressed = encoder.finish().ok()?;
    Some(Bytes::from(compressed))
}
