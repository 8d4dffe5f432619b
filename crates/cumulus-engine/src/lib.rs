//! # cumulus-engine
//!
//! The background media-processing job engine:
//!
//! - A capability prober that decides, once at startup, which queue
//!   backend and which job kinds are usable
//! - A queue facade ([`engine::QueueEngine`]) with a uniform
//!   submit/status/cancel contract over both backends
//! - A durable, multi-worker, crash-recoverable backend over Redis and a
//!   single-process bounded fallback backend
//! - A process executor driving external media tools with hard timeouts
//!   and streamed progress extraction
//! - A progress publisher relaying monotone progress to the status store
//!   and the realtime sink
//! - Periodic retention and rate-limit counter sweeps

pub mod backend;
pub mod capability;
pub mod engine;
pub mod process;
pub mod publisher;
pub mod rate_limit;
pub mod retention;
pub mod runner;
pub mod tools;

mod bootstrap;

pub use bootstrap::MediaEngine;
pub use engine::QueueEngine;
