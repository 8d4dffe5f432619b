//! Queue backends: durable (Redis) and in-process fallback.

pub mod durable;
pub mod fallback;

pub use durable::DurableBackend;
pub use fallback::FallbackBackend;
