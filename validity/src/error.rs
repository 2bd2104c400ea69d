//! Error types for validator configuration and execution.

use std::any::Any;

/// Error raised while resolving a field's validator configuration.
///
/// These are setup errors: they surface synchronously from the call that
/// configures a field and never from `validate()`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The validator name is neither in the local nor the process-wide registry.
    #[error("Unknown validator '{name}'")]
    UnknownValidator { name: String },

    /// A validator reference could not be interpreted.
    #[error("Invalid validator reference: {reason}")]
    InvalidReference { reason: String },
}

impl ConfigError {
    /// Creates a new unknown validator error.
    pub fn unknown_validator(name: impl Into<String>) -> Self {
        Self::UnknownValidator { name: name.into() }
    }

    /// Creates a new invalid reference error.
    pub fn invalid_reference(reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_reference(err.to_string())
    }
}

/// Error returned by a synchronous check that could not run to completion.
///
/// The executor contains it: the validator is marked failed and its siblings
/// keep running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ExecutionError {
    /// Error message
    pub message: String,
}

impl ExecutionError {
    /// Create a new execution error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ExecutionError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ExecutionError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Marker for an async check that rejected instead of resolving.
///
/// The reason is kept for logging only and never becomes the validator's
/// message.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("validator rejected")]
pub struct Rejection {
    pub reason: Option<String>,
}

impl Rejection {
    /// Rejection without a reason.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejection carrying a reason.
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }
}

/// Failure text for a check that panicked.
///
/// The executor uses it when a check panics synchronously or while its
/// future is polled. `panic!` payloads are `&str` or `String`; any other
/// payload gets a placeholder naming the validator failure.
pub fn extract_panic_message(panic: &Box<dyn Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "validator panicked".to_string())
}
