//! Unified error types for the Cumulus media engine.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. Submission-time rejections
//! (`InvalidPayload`, `RateLimited`, `QueueFull`, `CapabilityUnavailable`)
//! and execution-time failures (`Timeout`, `ProcessFailure`) are modelled
//! as [`ErrorKind`] variants so callers can match on the category without
//! parsing messages.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The job payload failed validation; the job never entered a queue.
    InvalidPayload,
    /// The submitting user exceeded their rate-limit window.
    RateLimited,
    /// The fallback backend's pending list is at its hard cap.
    QueueFull,
    /// The durable backend is required but unavailable, or the job kind's
    /// external tool was not found at startup.
    CapabilityUnavailable,
    /// An external process exceeded its wall-clock timeout.
    Timeout,
    /// An external process exited non-zero or produced no output artifact.
    ProcessFailure,
    /// A status-store write or read failed.
    Persistence,
    /// A queue-store operation failed.
    Queue,
    /// The requested job record was not found.
    NotFound,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal engine error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPayload => write!(f, "INVALID_PAYLOAD"),
            Self::RateLimited => write!(f, "RATE_LIMITED"),
            Self::QueueFull => write!(f, "QUEUE_FULL"),
            Self::CapabilityUnavailable => write!(f, "CAPABILITY_UNAVAILABLE"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::ProcessFailure => write!(f, "PROCESS_FAILURE"),
            Self::Persistence => write!(f, "PERSISTENCE"),
            Self::Queue => write!(f, "QUEUE"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

impl ErrorKind {
    /// Whether a failure of this kind may succeed on a later attempt of the
    /// same job (durable backend retry policy).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::ProcessFailure | Self::Queue)
    }
}

/// The unified error used throughout the media engine.
///
/// Crate-specific errors are mapped into `AppError` using `From` impls or
/// explicit `.map_err()` calls, giving a single error type at the
/// engine boundary.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid-payload error.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPayload, message)
    }

    /// Create a rate-limited error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    /// Create a queue-full error.
    pub fn queue_full(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::QueueFull, message)
    }

    /// Create a capability-unavailable error.
    pub fn capability_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CapabilityUnavailable, message)
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create a process-failure error.
    pub fn process_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProcessFailure, message)
    }

    /// Create a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Persistence, message)
    }

    /// Create a queue-store error.
    pub fn queue(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Queue, message)
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Internal, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
