//! Integration test suite for the value bridge
//!
//! This crate provides integration tests that verify components work
//! together correctly across component boundaries.

/// Re-export components for test convenience
pub mod components {
    pub use bridge_cli;
    pub use host_types;
    pub use persistent_types;
    pub use value_bridge;
}
