//! Cross-runtime value bridge
//!
//! Couples a host engine (reference-counted objects with finalization hooks)
//! to a persistent engine (immutable, structurally shared values) inside one
//! execution context. This crate provides:
//! - Bidirectional conversion between host values and persistent handles
//! - A bridge table mapping host identities to persistent handles
//! - Root and weak-reference coordination between the two collectors
//! - Redirection of host property access and calls on bridged objects
//!
//! # Example
//!
//! ```
//! use host_types::HostValue;
//! use value_bridge::{BridgeConfig, BridgeRegistry};
//!
//! let registry = BridgeRegistry::new(BridgeConfig::default());
//! let cx = registry.open();
//!
//! let object = cx.realm().new_object(vec![("x".to_string(), HostValue::Number(1.0))]);
//! let before = cx.bridge_object(&object).unwrap();
//! cx.set_property(&object, "x", &HostValue::Number(2.0)).unwrap();
//!
//! let after = cx.table().lookup_by_host(object.identity()).unwrap().unwrap();
//! assert!(!after.same_handle(&before));
//! assert_eq!(cx.get_property(&object, "x").unwrap(), HostValue::Number(2.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod converter;
pub mod diagnostics;
pub mod error;
pub mod redirect;
pub mod resources;
pub mod roots;
pub mod table;

pub use config::BridgeConfig;
pub use context::{BridgeRegistry, ExecutionContext};
pub use converter::{ValueConverter, MAX_SAFE_INTEGER};
pub use diagnostics::{BridgeStats, LeakReport, LeakWarning};
pub use error::{
    BridgeError, BridgeResult, ConfigError, ConversionError, ConversionResult, RedirectError,
    RedirectResult,
};
pub use redirect::{BridgeState, Handler, Operation, OperationKind, OperationRedirector};
pub use resources::{NativeResourceTable, ResourceHandle};
pub use roots::{RootCoordinator, RootedHandoff};
pub use table::{BridgeEntry, BridgeTable, ContextId, Registration};
