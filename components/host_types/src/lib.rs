//! Host engine value model.
//!
//! This crate provides the value representation of the embedded, mutable,
//! reference-counted scripting engine (the "host engine") as seen by the
//! value bridge.
//!
//! # Overview
//!
//! - [`HostValue`] - Tagged representation of host values
//! - [`HostObject`] - Reference-counted heap object with a stable [`HostIdentity`]
//! - [`ObjectKind`] - The shape of a heap object (plain, array, function, ...)
//! - [`HostRealm`] - Per-context object allocator and weak identity index
//! - [`HostError`] - Errors raised by host-side property and call semantics
//!
//! Objects are released when their last [`HostObjectRef`] is dropped. At that
//! point every hook registered with [`HostObject::on_finalize`] runs exactly
//! once with the object's identity.
//!
//! # Examples
//!
//! ```
//! use host_types::{HostRealm, HostValue};
//!
//! let realm = HostRealm::new();
//! let obj = realm.new_object(vec![("a".to_string(), HostValue::Number(1.0))]);
//!
//! assert_eq!(obj.get_property("a"), HostValue::Number(1.0));
//! assert_eq!(obj.get_property("missing"), HostValue::Undefined);
//! assert_eq!(HostValue::Object(obj).type_of(), "object");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod identity;
mod object;
mod realm;
mod value;

pub use error::{HostError, HostErrorKind, HostResult};
pub use identity::HostIdentity;
pub use object::{
    ExternalResource, FinalizationHook, FunctionBody, FunctionData, HostObject, HostObjectRef,
    NativeFn, ObjectKind, MAX_ARRAY_LENGTH,
};
pub use realm::HostRealm;
pub use value::HostValue;
