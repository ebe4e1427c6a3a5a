//! Error types for the CLI

use thiserror::Error;
use value_bridge::{BridgeError, ConfigError, RedirectError};

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// File I/O error
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    /// Input is not valid JSON
    #[error("Invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A bridge table operation failed
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// A conversion or redirected operation failed
    #[error(transparent)]
    Redirect(#[from] RedirectError),

    /// Malformed `--set` argument
    #[error("Invalid assignment '{0}': expected KEY=JSON")]
    InvalidAssignment(String),

    /// Property writes need an object at the document root
    #[error("Cannot apply assignments: document root is a {0}, not an object")]
    NotAnObject(&'static str),

    /// Neither a file nor inline input was given
    #[error("No input: pass --file or --eval")]
    NoInput,
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
