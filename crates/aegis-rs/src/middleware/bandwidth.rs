//! Bandwidth shaping.
//!
//! Enforces a steady byte rate by slicing a buffered body into chunks and
//! sleeping between them. The response side streams paced chunks to the
//! client; the request side delays proportionally to the body it just read.

use bytes::Bytes;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BandwidthConfig {
    /// Cap applied while reading the request body.
    #[serde(default)]
    pub request_bytes_per_second: Option<u64>,
    /// Cap applied while writing the response body.
    #[serde(default)]
    pub response_bytes_per_second: Option<u64>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    8 * 1024
}

impl BandwidthConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.request_bytes_per_second == Some(0) || self.response_bytes_per_second == Some(0) {
            return Err("bandwidth caps must be greater than 0".to_string());
        }
        if self.chunk_size == 0 {
            return Err("bandwidth chunk_size must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn is_noop(&self) -> bool {
        self.request_bytes_per_second.is_none() && self.response_bytes_per_second.is_none()
    }
}

/// Sleep that models reading `len` bytes at the request-side cap.
pub async fn pace_request(config: &BandwidthConfig, len: usize) {
    if let Some(bps) = config.request_bytes_per_second {
        if len > 0 {
            tokio::time::sleep(Duration::from_secs_f64(len as f64 / bps as f64)).await;
        }
    }
}

/// Splits `body` into chunks delivered at `bytes_per_second`.
///
/// The first chunk goes out immediately; every subsequent chunk waits for
/// the time the previous one "cost" at the configured rate.
pub fn paced_stream(
    body: Bytes,
    bytes_per_second: u64,
    chunk_size: usize,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    let chunk_size = chunk_size.max(1);
    futures::stream::unfold((body, 0usize, false), move |(body, offset, started)| {
        async move {
            if offset >= body.len() {
                return None;
            }
            if started {
                // Every chunk before this one was full-sized.
                let delay = Duration::from_secs_f64(chunk_size as f64 / bytes_per_second as f64);
                tokio::time::sleep(delay).await;
            }
            let end = (offset + chunk_size).min(body.len());
            let chunk = body.slice(offset..end);
            Some((Ok(chunk), (body, end, true)))
        }
    })
}
