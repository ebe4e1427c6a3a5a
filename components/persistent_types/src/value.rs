//! Persistent value handles.
//!
//! A [`PersistentValue`] is a cheap-to-clone handle. Immediates (unit,
//! booleans, numbers) are stored inline; every other kind lives behind an
//! `Arc` and is shared structurally between handles.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::cell::{CellClass, PersistentCell};
use crate::error::{KindMismatch, MethodError};
use crate::handle::HandleKey;
use crate::method::PersistentMethod;

/// The kind of a persistent value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueKind {
    /// The unit value
    Unit,
    /// true or false
    Boolean,
    /// 64-bit signed integer
    Integer,
    /// IEEE 754 double
    Double,
    /// UTF-8 string (a code-point sequence)
    String,
    /// Ordered list
    List,
    /// Key/value map
    Map,
    /// Fixed-size tuple
    Tuple,
    /// Set of distinct values
    Set,
    /// Set with multiplicities
    Multiset,
    /// Raw bytes
    ByteBuffer,
    /// Attribute-bearing cell
    Cell,
    /// Persistent-engine callable
    Method,
}

impl ValueKind {
    /// Returns the kind's name.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Unit => "unit",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Double => "double",
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Map => "map",
            ValueKind::Tuple => "tuple",
            ValueKind::Set => "set",
            ValueKind::Multiset => "multiset",
            ValueKind::ByteBuffer => "byte-buffer",
            ValueKind::Cell => "cell",
            ValueKind::Method => "method",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle to a persistent value.
///
/// Equality, ordering and hashing are structural for data kinds. Cells and
/// methods carry identity, so they compare by handle.
#[derive(Debug, Clone)]
pub enum PersistentValue {
    /// The unit value
    Unit,
    /// true or false
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// IEEE 754 double
    Double(f64),
    /// UTF-8 string
    String(Arc<str>),
    /// Ordered list
    List(Arc<Vec<PersistentValue>>),
    /// Key/value map, ordered by key
    Map(Arc<BTreeMap<PersistentValue, PersistentValue>>),
    /// Fixed-size tuple
    Tuple(Arc<[PersistentValue]>),
    /// Set of distinct values
    Set(Arc<BTreeSet<PersistentValue>>),
    /// Value to multiplicity
    Multiset(Arc<BTreeMap<PersistentValue, usize>>),
    /// Raw bytes
    ByteBuffer(Arc<[u8]>),
    /// Attribute-bearing cell
    Cell(Arc<PersistentCell>),
    /// Persistent-engine callable
    Method(Arc<PersistentMethod>),
}

impl PersistentValue {
    /// Creates a string value.
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        PersistentValue::String(s.into())
    }

    /// Creates a list from items in order.
    pub fn list(items: impl IntoIterator<Item = PersistentValue>) -> Self {
        PersistentValue::List(Arc::new(items.into_iter().collect()))
    }

    /// Creates a map from entries; later duplicates win.
    pub fn map(entries: impl IntoIterator<Item = (PersistentValue, PersistentValue)>) -> Self {
        PersistentValue::Map(Arc::new(entries.into_iter().collect()))
    }

    /// Creates a tuple.
    pub fn tuple(items: impl IntoIterator<Item = PersistentValue>) -> Self {
        PersistentValue::Tuple(items.into_iter().collect())
    }

    /// Creates a set.
    pub fn set(items: impl IntoIterator<Item = PersistentValue>) -> Self {
        PersistentValue::Set(Arc::new(items.into_iter().collect()))
    }

    /// Creates a multiset, counting repeated items.
    pub fn multiset(items: impl IntoIterator<Item = PersistentValue>) -> Self {
        let mut counts = BTreeMap::new();
        for item in items {
            *counts.entry(item).or_insert(0) += 1;
        }
        PersistentValue::Multiset(Arc::new(counts))
    }

    /// Creates a byte buffer.
    pub fn bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        PersistentValue::ByteBuffer(bytes.into())
    }

    /// Creates a cell with the given class, attributes and mutability.
    pub fn cell<K>(
        class: CellClass,
        attributes: impl IntoIterator<Item = (K, PersistentValue)>,
        mutable: bool,
    ) -> Self
    where
        K: Into<Arc<str>>,
    {
        PersistentValue::Cell(Arc::new(PersistentCell::new(class, attributes, mutable)))
    }

    /// Creates a callable method.
    pub fn method<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&PersistentValue, &[PersistentValue]) -> Result<PersistentValue, MethodError>
            + Send
            + Sync
            + 'static,
    {
        PersistentValue::Method(Arc::new(PersistentMethod::new(name, body)))
    }

    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            PersistentValue::Unit => ValueKind::Unit,
            PersistentValue::Boolean(_) => ValueKind::Boolean,
            PersistentValue::Integer(_) => ValueKind::Integer,
            PersistentValue::Double(_) => ValueKind::Double,
            PersistentValue::String(_) => ValueKind::String,
            PersistentValue::List(_) => ValueKind::List,
            PersistentValue::Map(_) => ValueKind::Map,
            PersistentValue::Tuple(_) => ValueKind::Tuple,
            PersistentValue::Set(_) => ValueKind::Set,
            PersistentValue::Multiset(_) => ValueKind::Multiset,
            PersistentValue::ByteBuffer(_) => ValueKind::ByteBuffer,
            PersistentValue::Cell(_) => ValueKind::Cell,
            PersistentValue::Method(_) => ValueKind::Method,
        }
    }

    /// Returns whether the value lives behind a shared allocation.
    pub fn is_heap(&self) -> bool {
        !matches!(
            self,
            PersistentValue::Unit
                | PersistentValue::Boolean(_)
                | PersistentValue::Integer(_)
                | PersistentValue::Double(_)
        )
    }

    /// Returns whether the value contains other values.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            PersistentValue::List(_)
                | PersistentValue::Map(_)
                | PersistentValue::Tuple(_)
                | PersistentValue::Set(_)
                | PersistentValue::Multiset(_)
                | PersistentValue::Cell(_)
                | PersistentValue::Method(_)
        )
    }

    /// Returns whether two handles refer to the same value.
    ///
    /// Heap kinds compare by allocation, immediates by value.
    pub fn same_handle(&self, other: &PersistentValue) -> bool {
        self.handle_key() == other.handle_key()
    }

    /// Returns the identity key of this handle.
    pub fn handle_key(&self) -> HandleKey {
        HandleKey::of(self)
    }

    /// Returns the boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PersistentValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PersistentValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the double, if this is one.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            PersistentValue::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PersistentValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list items, if this is a list.
    pub fn as_list(&self) -> Option<&[PersistentValue]> {
        match self {
            PersistentValue::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Returns the map entries, if this is a map.
    pub fn as_map(&self) -> Option<&BTreeMap<PersistentValue, PersistentValue>> {
        match self {
            PersistentValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Returns the tuple items, if this is a tuple.
    pub fn as_tuple(&self) -> Option<&[PersistentValue]> {
        match self {
            PersistentValue::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the set members, if this is a set.
    pub fn as_set(&self) -> Option<&BTreeSet<PersistentValue>> {
        match self {
            PersistentValue::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the multiplicities, if this is a multiset.
    pub fn as_multiset(&self) -> Option<&BTreeMap<PersistentValue, usize>> {
        match self {
            PersistentValue::Multiset(counts) => Some(counts),
            _ => None,
        }
    }

    /// Returns the bytes, if this is a byte buffer.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PersistentValue::ByteBuffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the cell, if this is one.
    pub fn as_cell(&self) -> Option<&PersistentCell> {
        match self {
            PersistentValue::Cell(cell) => Some(cell),
            _ => None,
        }
    }

    /// Returns the method, if this is one.
    pub fn as_method(&self) -> Option<&PersistentMethod> {
        match self {
            PersistentValue::Method(method) => Some(method),
            _ => None,
        }
    }

    /// Reads a cell attribute.
    pub fn get_attribute(&self, key: &str) -> Option<PersistentValue> {
        self.as_cell().and_then(|cell| cell.get(key).cloned())
    }

    /// Returns a new cell handle with `key` set to `value`.
    ///
    /// The receiver is untouched; unchanged attributes are shared.
    pub fn set_attribute(
        &self,
        key: impl Into<Arc<str>>,
        value: PersistentValue,
    ) -> Result<PersistentValue, KindMismatch> {
        match self {
            PersistentValue::Cell(cell) => Ok(PersistentValue::Cell(Arc::new(
                cell.with_attribute(key, value),
            ))),
            other => Err(KindMismatch::new(ValueKind::Cell, other.kind())),
        }
    }

    /// Returns a new list handle with `value` appended.
    pub fn append(&self, value: PersistentValue) -> Result<PersistentValue, KindMismatch> {
        match self {
            PersistentValue::List(items) => {
                let mut items = Arc::clone(items);
                Arc::make_mut(&mut items).push(value);
                Ok(PersistentValue::List(items))
            }
            other => Err(KindMismatch::new(ValueKind::List, other.kind())),
        }
    }

    /// Returns a new map handle with `key` bound to `value`.
    pub fn insert(
        &self,
        key: PersistentValue,
        value: PersistentValue,
    ) -> Result<PersistentValue, KindMismatch> {
        match self {
            PersistentValue::Map(entries) => {
                let mut entries = Arc::clone(entries);
                Arc::make_mut(&mut entries).insert(key, value);
                Ok(PersistentValue::Map(entries))
            }
            other => Err(KindMismatch::new(ValueKind::Map, other.kind())),
        }
    }

    /// Returns a new set or multiset handle containing `value`.
    pub fn add_member(&self, value: PersistentValue) -> Result<PersistentValue, KindMismatch> {
        match self {
            PersistentValue::Set(items) => {
                let mut items = Arc::clone(items);
                Arc::make_mut(&mut items).insert(value);
                Ok(PersistentValue::Set(items))
            }
            PersistentValue::Multiset(counts) => {
                let mut counts = Arc::clone(counts);
                *Arc::make_mut(&mut counts).entry(value).or_insert(0) += 1;
                Ok(PersistentValue::Multiset(counts))
            }
            other => Err(KindMismatch::new(ValueKind::Set, other.kind())),
        }
    }

    /// Invokes a method handle.
    pub fn invoke(
        &self,
        this: &PersistentValue,
        args: &[PersistentValue],
    ) -> Result<PersistentValue, MethodError> {
        match self {
            PersistentValue::Method(method) => method.invoke(this, args),
            other => Err(MethodError::NotCallable { kind: other.kind() }),
        }
    }

    /// Number of elements for collections, bytes for buffers.
    pub fn len(&self) -> Option<usize> {
        match self {
            PersistentValue::String(s) => Some(s.chars().count()),
            PersistentValue::List(items) => Some(items.len()),
            PersistentValue::Map(entries) => Some(entries.len()),
            PersistentValue::Tuple(items) => Some(items.len()),
            PersistentValue::Set(items) => Some(items.len()),
            PersistentValue::Multiset(counts) => Some(counts.values().sum()),
            PersistentValue::ByteBuffer(bytes) => Some(bytes.len()),
            PersistentValue::Cell(cell) => Some(cell.attributes().len()),
            _ => None,
        }
    }

    /// Returns true for empty collections.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    fn rank(&self) -> u8 {
        self.kind() as u8
    }
}

impl Ord for PersistentValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use PersistentValue::*;
        match (self, other) {
            (Unit, Unit) => Ordering::Equal,
            (Boolean(a), Boolean(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Double(a), Double(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (List(a), List(b)) => a.cmp(b),
            (Map(a), Map(b)) => a.cmp(b),
            (Tuple(a), Tuple(b)) => a.cmp(b),
            (Set(a), Set(b)) => a.cmp(b),
            (Multiset(a), Multiset(b)) => a.cmp(b),
            (ByteBuffer(a), ByteBuffer(b)) => a.cmp(b),
            (Cell(a), Cell(b)) => Arc::as_ptr(a).cmp(&Arc::as_ptr(b)),
            (Method(a), Method(b)) => Arc::as_ptr(a).cmp(&Arc::as_ptr(b)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for PersistentValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PersistentValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PersistentValue {}

impl Hash for PersistentValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            PersistentValue::Unit => {}
            PersistentValue::Boolean(b) => b.hash(state),
            PersistentValue::Integer(n) => n.hash(state),
            PersistentValue::Double(n) => n.to_bits().hash(state),
            PersistentValue::String(s) => s.hash(state),
            PersistentValue::List(items) => items.hash(state),
            PersistentValue::Map(entries) => entries.hash(state),
            PersistentValue::Tuple(items) => items.hash(state),
            PersistentValue::Set(items) => items.hash(state),
            PersistentValue::Multiset(counts) => counts.hash(state),
            PersistentValue::ByteBuffer(bytes) => bytes.hash(state),
            PersistentValue::Cell(cell) => Arc::as_ptr(cell).hash(state),
            PersistentValue::Method(method) => Arc::as_ptr(method).hash(state),
        }
    }
}

impl From<bool> for PersistentValue {
    fn from(b: bool) -> Self {
        PersistentValue::Boolean(b)
    }
}

impl From<i64> for PersistentValue {
    fn from(n: i64) -> Self {
        PersistentValue::Integer(n)
    }
}

impl From<f64> for PersistentValue {
    fn from(n: f64) -> Self {
        PersistentValue::Double(n)
    }
}

impl From<&str> for PersistentValue {
    fn from(s: &str) -> Self {
        PersistentValue::string(s)
    }
}

impl fmt::Display for PersistentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistentValue::Unit => write!(f, "()"),
            PersistentValue::Boolean(b) => write!(f, "{}", b),
            PersistentValue::Integer(n) => write!(f, "{}", n),
            PersistentValue::Double(n) => write!(f, "{:?}", n),
            PersistentValue::String(s) => write!(f, "{:?}", s),
            PersistentValue::Cell(cell) => write!(f, "<cell {:?}>", cell.class()),
            PersistentValue::Method(method) => write!(f, "<method {}>", method.name()),
            other => write!(f, "<{} of {}>", other.kind(), other.len().unwrap_or(0)),
        }
    }
}
