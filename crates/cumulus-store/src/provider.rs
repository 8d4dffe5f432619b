//! Runtime status-store selection.

use std::sync::Arc;

use cumulus_core::traits::status_store::JobStatusStore;
use cumulus_core::types::capability::CapabilityDescriptor;

use crate::memory::status::MemoryStatusStore;
use crate::redis::client::RedisClient;
use crate::redis::status::RedisStatusStore;

/// Build the status store matching the probed capabilities: Redis when
/// the durable store is reachable, in-memory otherwise.
///
/// The choice is independent of the queue backend only in one direction:
/// a durable deployment always gets the Redis store, while a fallback
/// deployment has nothing durable to write to.
pub fn build_status_store(
    capabilities: &CapabilityDescriptor,
    redis: Option<&RedisClient>,
) -> Arc<dyn JobStatusStore> {
    match (capabilities.durable_store_available, redis) {
        (true, Some(client)) => {
            tracing::info!("Using Redis job status store");
            Arc::new(RedisStatusStore::new(client.clone()))
        }
        _ => {
            tracing::info!("Using in-memory job status store");
            Arc::new(MemoryStatusStore::new())
        }
    }
}
