//! External process execution with timeouts and progress extraction.

pub mod executor;
pub mod progress;

pub use executor::{ProcessExecutor, ProcessSpec};
pub use progress::ProgressParser;
