//! Reflection-driven descriptor discovery.
//!
//! On a cache miss the translator asks the backend's server-reflection
//! service for its service list, fetches the file descriptors containing
//! each symbol, deduplicates files across services and builds a descriptor
//! pool. Pools are cached per backend URL with a TTL; stale entries are
//! refetched on demand.

use dashmap::DashMap;
use prost::Message;
use prost_reflect::DescriptorPool;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tonic::transport::Channel;
use tonic_reflection::pb::v1::server_reflection_client::ServerReflectionClient;
use tonic_reflection::pb::v1::server_reflection_request::MessageRequest;
use tonic_reflection::pb::v1::server_reflection_response::MessageResponse;
use tonic_reflection::pb::v1::ServerReflectionRequest;

struct CachedPool {
    pool: DescriptorPool,
    expires_at: Instant,
}

/// Process-global cache: backend URL -> descriptor pool.
pub struct DescriptorCache {
    entries: DashMap<String, CachedPool>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Cached pool, or a full reflection round-trip on miss/expiry.
    pub async fn get_or_fetch(
        &self,
        backend: &str,
        channel: Channel,
        ttl: Duration,
    ) -> Result<DescriptorPool, String> {
        if let Some(entry) = self.entries.get(backend) {
            if Instant::now() < entry.expires_at {
                return Ok(entry.pool.clone());
            }
        }
        let pool = fetch_descriptors(channel).await?;
        self.entries.insert(
            backend.to_string(),
            CachedPool {
                pool: pool.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        log::info!(
            "descriptor cache refreshed for {} ({} services)",
            backend,
            pool.services().count()
        );
        Ok(pool)
    }

    pub fn invalidate(&self, backend: &str) {
        self.entries.remove(backend);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DescriptorCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the reflection flow: list services, fetch the files containing
/// each symbol, deduplicate and build one pool.
async fn fetch_descriptors(channel: Channel) -> Result<DescriptorPool, String> {
    let mut client = ServerReflectionClient::new(channel);

    let list_request = ServerReflectionRequest {
        host: String::new(),
        message_request: Some(MessageRequest::ListServices(String::new())),
    };
    let mut stream = client
        .server_reflection_info(futures::stream::iter(vec![list_request]))
        .await
        .map_err(|e| format!("reflection list-services failed: {}", e))?
        .into_inner();

    let mut services = Vec::new();
    while let Some(response) = stream
        .message()
        .await
        .map_err(|e| format!("reflection stream error: {}", e))?
    {
        if let Some(MessageResponse::ListServicesResponse(list)) = response.message_response {
            for service in list.service {
                // The reflection service itself never translates.
                if !service.name.starts_with("grpc.reflection.") {
                    services.push(service.name);
                }
            }
        }
    }
    if services.is_empty() {
        return Err("backend exposes no reflectable services".to_string());
    }

    let symbol_requests: Vec<ServerReflectionRequest> = services
        .iter()
        .map(|symbol| ServerReflectionRequest {
            host: String::new(),
            message_request: Some(MessageRequest::FileContainingSymbol(symbol.clone())),
        })
        .collect();
    let mut stream = client
        .server_reflection_info(futures::stream::iter(symbol_requests))
        .await
        .map_err(|e| format!("reflection file-containing-symbol failed: {}", e))?
        .into_inner();

    // Keyed by file name: the same file arrives once per service it hosts.
    let mut files: BTreeMap<String, FileDescriptorProto> = BTreeMap::new();
    while let Some(response) = stream
        .message()
        .await
        .map_err(|e| format!("reflection stream error: {}", e))?
    {
        if let Some(MessageResponse::FileDescriptorResponse(fd)) = response.message_response {
            for bytes in fd.file_descriptor_proto {
                let proto = FileDescriptorProto::decode(bytes.as_slice())
                    .map_err(|e| format!("invalid file descriptor from reflection: {}", e))?;
                let name = proto.name().to_string();
                files.entry(name).or_insert(proto);
            }
        }
    }

    let set = FileDescriptorSet {
        file: files.into_values().collect(),
    };
    DescriptorPool::from_file_descriptor_set(set)
        .map_err(|e| format!("descriptor pool build failed: {}", e))
}
