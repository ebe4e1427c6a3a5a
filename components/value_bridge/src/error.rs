//! Error taxonomy of the value bridge.
//!
//! Conversion and bridge errors are returned to the caller as explicit
//! results; nothing is coerced to a default value. Leak warnings are data,
//! see [`LeakWarning`](crate::LeakWarning), and never appear here.

use std::io;
use std::path::PathBuf;

use host_types::{HostError, HostIdentity};
use persistent_types::{CellClass, MethodError};
use thiserror::Error;

use crate::ContextId;

/// Failure converting between host and persistent values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The value's kind has no persistent representation
    #[error("unsupported host kind: {kind}")]
    UnsupportedKind {
        /// Host kind name
        kind: &'static str,
    },
    /// The host object graph reaches an object that is still being converted
    #[error("cyclic structure through {identity}")]
    CyclicStructure {
        /// Identity re-entered during conversion
        identity: HostIdentity,
    },
    /// Nesting deeper than the configured limit
    #[error("conversion exceeded the depth limit of {limit}")]
    DepthLimitExceeded {
        /// Configured limit
        limit: usize,
    },
    /// The native resource side table no longer holds this handle
    #[error("native resource handle {handle} is stale")]
    StaleResource {
        /// Raw handle stored in the persistent value
        handle: i64,
    },
    /// A tagged cell lacks the attribute its class requires
    #[error("malformed {class:?} cell: missing or invalid `{attribute}`")]
    MalformedCell {
        /// Class of the cell
        class: CellClass,
        /// Attribute that is missing or invalid
        attribute: &'static str,
    },
}

/// Failure of a bridge table or root coordinator operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The context was never opened or has been torn down
    #[error("execution context {context} not found")]
    ContextNotFound {
        /// Context addressed
        context: ContextId,
    },
    /// No entry exists for the identity
    #[error("no bridge entry for {identity}")]
    UnknownIdentity {
        /// Identity addressed
        identity: HostIdentity,
    },
    /// The registration conflicts with an existing mapping
    #[error("cannot register {identity}: conflicts with the mapping of {existing}")]
    DuplicateRegistration {
        /// Identity being registered
        identity: HostIdentity,
        /// Identity that holds the conflicting mapping
        existing: HostIdentity,
    },
    /// The bridged value does not accept writes
    #[error("{identity} is bridged to an immutable value")]
    ImmutableTarget {
        /// Identity of the target
        identity: HostIdentity,
    },
}

/// Failure of a redirected operation.
#[derive(Debug, Error)]
pub enum RedirectError {
    /// Bridge table failure
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    /// Conversion failure
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// Host fallback semantics failed
    #[error(transparent)]
    Host(#[from] HostError),
    /// The persistent call failed
    #[error(transparent)]
    Method(#[from] MethodError),
}

/// Failure loading a [`BridgeConfig`](crate::BridgeConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
    /// The document is not valid JSON for the config schema
    #[error("invalid config document: {0}")]
    Parse(#[from] serde_json::Error),
    /// A field holds an unusable value
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Result type for conversions
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Result type for bridge table and root coordinator operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Result type for redirected operations
pub type RedirectResult<T> = Result<T, RedirectError>;
