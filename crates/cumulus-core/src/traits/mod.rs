//! Trait seams between the engine, the stores, and external collaborators.

pub mod backend;
pub mod sink;
pub mod status_store;

pub use backend::{BackendStats, JobBackend};
pub use sink::ProgressSink;
pub use status_store::{JobStatusStore, StatusCounts};
