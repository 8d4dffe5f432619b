//! Domain events emitted by the media engine.
//!
//! Events are pushed into the realtime notification sink so that status
//! panels and clients can follow jobs without polling.

pub mod job;

pub use job::JobEvent;
