//! Persistent value algebra.
//!
//! Values are immutable by default and share structure: every "mutation"
//! returns a new handle and leaves the receiver untouched, so any holder of an
//! older handle keeps observing its snapshot.
//!
//! # Overview
//!
//! - [`PersistentValue`] - Handle to a persistent value of any kind
//! - [`PersistentCell`] - Attribute-bearing cell, optionally mutable
//! - [`PersistentMethod`] - Callable executed by the persistent engine
//! - [`HandleKey`] - Hash/equality identity of a handle (for reverse maps)
//! - [`WeakHandle`] - Non-owning handle that never extends a value's lifetime
//!
//! # Examples
//!
//! ```
//! use persistent_types::{CellClass, PersistentValue};
//!
//! let p1 = PersistentValue::cell(CellClass::Object, [("a", PersistentValue::Integer(1))], true);
//! let p2 = p1.set_attribute("b", PersistentValue::Integer(2)).unwrap();
//!
//! assert!(!p1.same_handle(&p2));
//! assert_eq!(p1.get_attribute("b"), None);
//! assert_eq!(p2.get_attribute("b"), Some(PersistentValue::Integer(2)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod cell;
mod error;
mod handle;
mod method;
mod value;

pub use cell::{CellClass, PersistentCell};
pub use error::{KindMismatch, MethodError};
pub use handle::{HandleKey, WeakHandle};
pub use method::{MethodFn, PersistentMethod};
pub use value::{PersistentValue, ValueKind};
