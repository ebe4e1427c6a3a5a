//! Host value representation.
//!
//! This module provides the `HostValue` enum that represents every value the
//! host engine can hand to the bridge. Primitives are stored inline; heap
//! objects are shared through reference-counted [`HostObjectRef`]s.

use num_bigint::BigInt;
use std::fmt;
use std::rc::Rc;

use crate::object::{HostObjectRef, ObjectKind};
use crate::HostIdentity;

/// Represents any host engine value.
///
/// # Examples
///
/// ```
/// use host_types::HostValue;
///
/// let undefined = HostValue::Undefined;
/// let number = HostValue::Number(42.0);
///
/// assert!(undefined.is_nullish());
/// assert!(!number.is_nullish());
/// assert_eq!(number.type_of(), "number");
/// ```
#[derive(Clone)]
pub enum HostValue {
    /// undefined
    Undefined,
    /// null
    Null,
    /// Boolean (true or false)
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String value
    String(String),
    /// Arbitrary precision integer
    BigInt(BigInt),
    /// Symbol with optional description
    Symbol(Option<String>),
    /// Heap object (shared by reference)
    Object(HostObjectRef),
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => write!(f, "Undefined"),
            HostValue::Null => write!(f, "Null"),
            HostValue::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            HostValue::Number(n) => f.debug_tuple("Number").field(n).finish(),
            HostValue::String(s) => f.debug_tuple("String").field(s).finish(),
            HostValue::BigInt(n) => f.debug_tuple("BigInt").field(n).finish(),
            HostValue::Symbol(desc) => f.debug_tuple("Symbol").field(desc).finish(),
            HostValue::Object(obj) => f
                .debug_tuple("Object")
                .field(&obj.identity())
                .field(&obj.class_name())
                .finish(),
        }
    }
}

/// Observational equality: primitives compare by value, objects by identity.
///
/// Note that `Number(NaN) != Number(NaN)`, as in the host engine.
impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Undefined, HostValue::Undefined) => true,
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Boolean(a), HostValue::Boolean(b)) => a == b,
            (HostValue::Number(a), HostValue::Number(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::BigInt(a), HostValue::BigInt(b)) => a == b,
            (HostValue::Symbol(_), HostValue::Symbol(_)) => false,
            (HostValue::Object(a), HostValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl HostValue {
    /// Returns true for `undefined` and `null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, HostValue::Undefined | HostValue::Null)
    }

    /// Returns the host `typeof` result for this value.
    ///
    /// # Examples
    ///
    /// ```
    /// use host_types::HostValue;
    ///
    /// assert_eq!(HostValue::Undefined.type_of(), "undefined");
    /// assert_eq!(HostValue::Null.type_of(), "object");
    /// assert_eq!(HostValue::Boolean(true).type_of(), "boolean");
    /// assert_eq!(HostValue::String("x".into()).type_of(), "string");
    /// ```
    pub fn type_of(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "object", // host quirk
            HostValue::Boolean(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::BigInt(_) => "bigint",
            HostValue::Symbol(_) => "symbol",
            HostValue::Object(obj) => {
                if obj.is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// Returns the heap object, if this value is one.
    pub fn as_object(&self) -> Option<&HostObjectRef> {
        match self {
            HostValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Returns the identity of the heap object, if this value is one.
    pub fn identity(&self) -> Option<HostIdentity> {
        self.as_object().map(|obj| obj.identity())
    }

    /// Returns a short name for the value's kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Boolean(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::BigInt(_) => "bigint",
            HostValue::Symbol(_) => "symbol",
            HostValue::Object(obj) => obj.class_name(),
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Boolean(b)
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<i32> for HostValue {
    fn from(n: i32) -> Self {
        HostValue::Number(f64::from(n))
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(s)
    }
}

impl From<BigInt> for HostValue {
    fn from(n: BigInt) -> Self {
        HostValue::BigInt(n)
    }
}

impl From<HostObjectRef> for HostValue {
    fn from(obj: HostObjectRef) -> Self {
        HostValue::Object(obj)
    }
}

/// String conversion following the host's `String()` rules for primitives.
///
/// # Examples
///
/// ```
/// use host_types::HostValue;
///
/// assert_eq!(HostValue::Undefined.to_string(), "undefined");
/// assert_eq!(HostValue::Number(42.0).to_string(), "42");
/// assert_eq!(HostValue::Number(f64::NEG_INFINITY).to_string(), "-Infinity");
/// ```
impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => write!(f, "undefined"),
            HostValue::Null => write!(f, "null"),
            HostValue::Boolean(b) => write!(f, "{}", b),
            HostValue::Number(n) => {
                if n.is_nan() {
                    write!(f, "NaN")
                } else if n.is_infinite() {
                    if n.is_sign_positive() {
                        write!(f, "Infinity")
                    } else {
                        write!(f, "-Infinity")
                    }
                } else if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            HostValue::String(s) => write!(f, "{}", s),
            HostValue::BigInt(n) => write!(f, "{}n", n),
            HostValue::Symbol(desc) => write!(f, "Symbol({})", desc.as_deref().unwrap_or("")),
            HostValue::Object(obj) => match &*obj.kind() {
                ObjectKind::Function(data) => {
                    write!(f, "function {}() {{ [native code] }}", data.name)
                }
                ObjectKind::Date(t) => write!(f, "[object Date {}]", t),
                _ => write!(f, "[object {}]", obj.class_name()),
            },
        }
    }
}
