//! Errors raised by the persistent value algebra.

use thiserror::Error;

use crate::ValueKind;

/// An operation was applied to a value of the wrong kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, found {found}")]
pub struct KindMismatch {
    /// Kind the operation requires
    pub expected: ValueKind,
    /// Kind it was applied to
    pub found: ValueKind,
}

impl KindMismatch {
    /// Creates a mismatch report.
    pub fn new(expected: ValueKind, found: ValueKind) -> Self {
        KindMismatch { expected, found }
    }
}

/// Failure of a persistent-engine call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MethodError {
    /// The callee is not a method
    #[error("{kind} is not callable")]
    NotCallable {
        /// Kind of the callee
        kind: ValueKind,
    },
    /// Wrong number of arguments
    #[error("{method} expects {expected} argument(s), got {got}")]
    Arity {
        /// Method name
        method: String,
        /// Expected count
        expected: usize,
        /// Supplied count
        got: usize,
    },
    /// The method body reported a failure
    #[error("{method}: {message}")]
    Failed {
        /// Method name
        method: String,
        /// Failure description
        message: String,
    },
}
