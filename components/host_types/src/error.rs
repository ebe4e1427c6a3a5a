//! Host engine error types.
//!
//! These errors describe failures of the host's own property and call
//! semantics, used when an operation falls back from the bridge to the host.

use thiserror::Error;

/// The kind of host error.
///
/// These correspond to the host engine's built-in error constructors that the
/// bridge can observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostErrorKind {
    /// Type error (e.g., calling a non-function, writing a frozen object)
    TypeError,
    /// Value out of allowed range
    RangeError,
    /// Internal engine error
    InternalError,
}

/// A host error with a kind and message.
///
/// # Examples
///
/// ```
/// use host_types::{HostError, HostErrorKind};
///
/// let error = HostError::type_error("undefined is not a function");
/// assert_eq!(error.kind, HostErrorKind::TypeError);
/// assert_eq!(error.to_string(), "TypeError: undefined is not a function");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct HostError {
    /// The type of error
    pub kind: HostErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl HostError {
    /// Create a TypeError
    pub fn type_error(message: impl Into<String>) -> Self {
        HostError {
            kind: HostErrorKind::TypeError,
            message: message.into(),
        }
    }

    /// Create a RangeError
    pub fn range_error(message: impl Into<String>) -> Self {
        HostError {
            kind: HostErrorKind::RangeError,
            message: message.into(),
        }
    }

    /// Create an InternalError
    pub fn internal(message: impl Into<String>) -> Self {
        HostError {
            kind: HostErrorKind::InternalError,
            message: message.into(),
        }
    }
}

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;
