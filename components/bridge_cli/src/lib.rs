//! Bridge inspection CLI library
//!
//! Loads JSON documents as host values, bridges them into an execution
//! context and reports the resulting bridge state as structured JSON.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod inspect;

pub use cli::Cli;
pub use error::{CliError, CliResult};
pub use inspect::{Assignment, InspectReport, Inspector};
