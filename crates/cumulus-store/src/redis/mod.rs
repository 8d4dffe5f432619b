//! Redis-backed stores.

pub mod client;
pub mod queue;
pub mod status;
