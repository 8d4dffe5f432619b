//! # cumulus-store
//!
//! Persistence for the Cumulus media engine:
//!
//! - **redis**: the durable queue store (pending/claimed lists, delayed
//!   retry set, bounded history) and a Redis status store, both backed by
//!   the [redis](https://crates.io/crates/redis) crate's connection manager
//! - **memory**: an in-process status store used when the durable store
//!   is unavailable
//!
//! The status store implementation is selected at runtime from the
//! capability descriptor.

pub mod memory;
pub mod provider;
pub mod redis;

pub use crate::provider::build_status_store;
pub use crate::redis::client::RedisClient;
pub use crate::redis::queue::DurableQueueStore;
