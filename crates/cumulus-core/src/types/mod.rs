//! Domain types for the media engine.

pub mod capability;
pub mod job;

pub use capability::CapabilityDescriptor;
pub use job::{JobKind, JobPayload, JobRecord, JobSnapshot, JobStatus};
