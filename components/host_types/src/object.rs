//! Host heap objects.
//!
//! Every heap object carries a stable [`HostIdentity`] and a list of
//! finalization hooks. The host engine reclaims an object when its last
//! [`HostObjectRef`] is dropped; that drop is the finalization signal the
//! bridge relies on, so no caller ever has to poll for liveness.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::{HostError, HostIdentity, HostResult, HostValue};

/// Native function body: `(this, args) -> result`.
pub type NativeFn = dyn Fn(&HostValue, &[HostValue]) -> HostResult<HostValue>;

/// A hook run once when its object is finalized.
pub type FinalizationHook = Box<dyn FnOnce(HostIdentity)>;

/// A native resource owned by an external object.
///
/// Resources are shareable across threads so the bridge can park them in its
/// side table while the persistent value only carries an integer handle.
pub type ExternalResource = Arc<dyn Any + Send + Sync>;

/// Shared reference to a host heap object.
pub type HostObjectRef = Rc<HostObject>;

/// How a function object executes.
#[derive(Clone)]
pub enum FunctionBody {
    /// Implemented by the host engine
    Native(Rc<NativeFn>),
    /// Reference-preserving stand-in with no host body; only the bridge can
    /// dispatch calls to it
    Placeholder,
}

/// Internal function data
#[derive(Clone)]
pub struct FunctionData {
    /// Function name (for diagnostics)
    pub name: String,
    /// Function body
    pub body: FunctionBody,
}

impl fmt::Debug for FunctionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match self.body {
            FunctionBody::Native(_) => "native",
            FunctionBody::Placeholder => "placeholder",
        };
        f.debug_struct("FunctionData")
            .field("name", &self.name)
            .field("body", &body)
            .finish()
    }
}

/// The shape and contents of a heap object.
#[derive(Clone)]
pub enum ObjectKind {
    /// Ordinary object; properties are kept in insertion order
    Plain {
        /// Own enumerable properties
        properties: Vec<(String, HostValue)>,
        /// Frozen objects reject writes
        frozen: bool,
    },
    /// Array; `None` marks a hole
    Array {
        /// Elements by index
        elements: Vec<Option<HostValue>>,
        /// Frozen arrays reject writes
        frozen: bool,
    },
    /// Callable object
    Function(FunctionData),
    /// Date holding milliseconds since the epoch
    Date(f64),
    /// Keyed collection, insertion ordered
    Map(Vec<(HostValue, HostValue)>),
    /// Value collection, insertion ordered
    Set(Vec<HostValue>),
    /// Raw byte storage
    ArrayBuffer(Vec<u8>),
    /// Opaque native resource
    External(ExternalResource),
}

impl fmt::Debug for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Plain { properties, frozen } => f
                .debug_struct("Plain")
                .field("properties", properties)
                .field("frozen", frozen)
                .finish(),
            ObjectKind::Array { elements, frozen } => f
                .debug_struct("Array")
                .field("elements", elements)
                .field("frozen", frozen)
                .finish(),
            ObjectKind::Function(data) => data.fmt(f),
            ObjectKind::Date(t) => f.debug_tuple("Date").field(t).finish(),
            ObjectKind::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            ObjectKind::Set(values) => f.debug_tuple("Set").field(values).finish(),
            ObjectKind::ArrayBuffer(bytes) => {
                f.debug_tuple("ArrayBuffer").field(&bytes.len()).finish()
            }
            ObjectKind::External(_) => write!(f, "External(...)"),
        }
    }
}

/// A reference-counted host heap object.
pub struct HostObject {
    identity: HostIdentity,
    kind: RefCell<ObjectKind>,
    hooks: RefCell<Vec<FinalizationHook>>,
}

impl HostObject {
    pub(crate) fn new(identity: HostIdentity, kind: ObjectKind) -> Self {
        HostObject {
            identity,
            kind: RefCell::new(kind),
            hooks: RefCell::new(Vec::new()),
        }
    }

    /// Returns the stable identity of this object.
    pub fn identity(&self) -> HostIdentity {
        self.identity
    }

    /// Borrows the object's contents.
    pub fn kind(&self) -> Ref<'_, ObjectKind> {
        self.kind.borrow()
    }

    /// Mutably borrows the object's contents.
    pub fn kind_mut(&self) -> RefMut<'_, ObjectKind> {
        self.kind.borrow_mut()
    }

    /// Returns the host class name of this object.
    pub fn class_name(&self) -> &'static str {
        match &*self.kind() {
            ObjectKind::Plain { .. } => "Object",
            ObjectKind::Array { .. } => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Date(_) => "Date",
            ObjectKind::Map(_) => "Map",
            ObjectKind::Set(_) => "Set",
            ObjectKind::ArrayBuffer(_) => "ArrayBuffer",
            ObjectKind::External(_) => "External",
        }
    }

    /// Returns whether this object can be called.
    pub fn is_callable(&self) -> bool {
        matches!(&*self.kind(), ObjectKind::Function(_))
    }

    /// Returns whether writes to this object are rejected.
    pub fn is_frozen(&self) -> bool {
        match &*self.kind() {
            ObjectKind::Plain { frozen, .. } | ObjectKind::Array { frozen, .. } => *frozen,
            _ => false,
        }
    }

    /// Freezes a plain object or array.
    pub fn freeze(&self) {
        match &mut *self.kind_mut() {
            ObjectKind::Plain { frozen, .. } | ObjectKind::Array { frozen, .. } => *frozen = true,
            _ => {}
        }
    }

    /// Returns own enumerable property keys in definition order.
    pub fn own_keys(&self) -> Vec<String> {
        match &*self.kind() {
            ObjectKind::Plain { properties, .. } => {
                properties.iter().map(|(k, _)| k.clone()).collect()
            }
            ObjectKind::Array { elements, .. } => elements
                .iter()
                .enumerate()
                .filter(|(_, e)| e.is_some())
                .map(|(i, _)| i.to_string())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Gets a property using host semantics.
    ///
    /// Missing properties read as `undefined`.
    pub fn get_property(&self, key: &str) -> HostValue {
        match &*self.kind() {
            ObjectKind::Plain { properties, .. } => properties
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or(HostValue::Undefined),
            ObjectKind::Array { elements, .. } => {
                if key == "length" {
                    return HostValue::Number(elements.len() as f64);
                }
                parse_index(key)
                    .and_then(|i| elements.get(i).cloned().flatten())
                    .unwrap_or(HostValue::Undefined)
            }
            ObjectKind::Function(data) if key == "name" => HostValue::String(data.name.clone()),
            ObjectKind::Map(entries) if key == "size" => HostValue::Number(entries.len() as f64),
            ObjectKind::Set(values) if key == "size" => HostValue::Number(values.len() as f64),
            ObjectKind::ArrayBuffer(bytes) if key == "byteLength" => {
                HostValue::Number(bytes.len() as f64)
            }
            _ => HostValue::Undefined,
        }
    }

    /// Sets a property using host semantics.
    pub fn set_property(&self, key: &str, value: HostValue) -> HostResult<()> {
        let class = self.class_name();
        match &mut *self.kind_mut() {
            ObjectKind::Plain { frozen: true, .. } | ObjectKind::Array { frozen: true, .. } => Err(
                HostError::type_error(format!("Cannot assign to '{}' of frozen {}", key, class)),
            ),
            ObjectKind::Plain { properties, .. } => {
                match properties.iter_mut().find(|(k, _)| k == key) {
                    Some(slot) => slot.1 = value,
                    None => properties.push((key.to_string(), value)),
                }
                Ok(())
            }
            ObjectKind::Array { elements, .. } => {
                if key == "length" {
                    let len = match value {
                        HostValue::Number(n)
                            if n >= 0.0 && n.fract() == 0.0 && n <= MAX_ARRAY_LENGTH as f64 =>
                        {
                            n as usize
                        }
                        _ => return Err(HostError::range_error("Invalid array length")),
                    };
                    return resize_elements(elements, len);
                }
                let index = parse_index(key).ok_or_else(|| {
                    HostError::type_error(format!("Arrays only accept index keys, got '{}'", key))
                })?;
                if index >= elements.len() {
                    resize_elements(elements, index.saturating_add(1))?;
                }
                elements[index] = Some(value);
                Ok(())
            }
            _ => Err(HostError::type_error(format!(
                "Cannot set property '{}' on {}",
                key, class
            ))),
        }
    }

    /// Calls this object using host semantics.
    pub fn call(&self, this: &HostValue, args: &[HostValue]) -> HostResult<HostValue> {
        // Release the borrow before running the body; it may touch this object.
        let body = match &*self.kind() {
            ObjectKind::Function(data) => match &data.body {
                FunctionBody::Native(f) => Rc::clone(f),
                FunctionBody::Placeholder => {
                    return Err(HostError::type_error(format!(
                        "{} is a placeholder without a host body",
                        data.name
                    )))
                }
            },
            _ => {
                return Err(HostError::type_error(format!(
                    "{} is not a function",
                    self.class_name()
                )))
            }
        };
        body(this, args)
    }

    /// Registers a hook that runs once when this object is finalized.
    pub fn on_finalize<F>(&self, hook: F)
    where
        F: FnOnce(HostIdentity) + 'static,
    {
        self.hooks.borrow_mut().push(Box::new(hook));
    }

    /// Returns the number of pending finalization hooks.
    pub fn finalizer_count(&self) -> usize {
        self.hooks.borrow().len()
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("identity", &self.identity)
            .field("kind", &*self.kind())
            .finish()
    }
}

impl Drop for HostObject {
    fn drop(&mut self) {
        let hooks = std::mem::take(self.hooks.get_mut());
        for hook in hooks {
            hook(self.identity);
        }
    }
}

/// Largest array length the host accepts.
pub const MAX_ARRAY_LENGTH: usize = 1 << 26;

/// Grows or truncates array storage, failing with a RangeError instead of
/// aborting when the length is out of range or cannot be allocated.
fn resize_elements(elements: &mut Vec<Option<HostValue>>, len: usize) -> HostResult<()> {
    if len > MAX_ARRAY_LENGTH {
        return Err(HostError::range_error("Invalid array length"));
    }
    if len > elements.len() {
        elements
            .try_reserve_exact(len - elements.len())
            .map_err(|_| HostError::range_error("Array buffer allocation failed"))?;
    }
    elements.resize(len, None);
    Ok(())
}

fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse().ok()
}
