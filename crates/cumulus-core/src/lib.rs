//! # cumulus-core
//!
//! Core crate for the Cumulus media engine. Contains the unified error
//! system, configuration schemas, the job model and state machine, the
//! capability descriptor, domain events, and the trait seams that the
//! store and engine crates implement.
//!
//! This crate has **no** internal dependencies on other Cumulus crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
