//! Handle identity and weak handles.
//!
//! The bridge keys its reverse map by [`HandleKey`]: heap values are keyed by
//! allocation, immediates by value. A [`WeakHandle`] keeps the allocation's
//! address reserved (so keys stay unambiguous) without keeping the value
//! reachable.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Weak};

use crate::cell::PersistentCell;
use crate::method::PersistentMethod;
use crate::{PersistentValue, ValueKind};

/// Hash/equality identity of a handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HandleKey {
    /// Heap value, identified by its allocation
    Heap {
        /// Kind of the value
        kind: ValueKind,
        /// Address of the shared allocation
        addr: usize,
    },
    /// Immediate value, identified by value
    Immediate(PersistentValue),
}

impl HandleKey {
    pub(crate) fn of(value: &PersistentValue) -> Self {
        let addr = match value {
            PersistentValue::String(s) => Arc::as_ptr(s) as *const () as usize,
            PersistentValue::List(items) => Arc::as_ptr(items) as *const () as usize,
            PersistentValue::Map(entries) => Arc::as_ptr(entries) as *const () as usize,
            PersistentValue::Tuple(items) => Arc::as_ptr(items) as *const () as usize,
            PersistentValue::Set(items) => Arc::as_ptr(items) as *const () as usize,
            PersistentValue::Multiset(counts) => Arc::as_ptr(counts) as *const () as usize,
            PersistentValue::ByteBuffer(bytes) => Arc::as_ptr(bytes) as *const () as usize,
            PersistentValue::Cell(cell) => Arc::as_ptr(cell) as *const () as usize,
            PersistentValue::Method(method) => Arc::as_ptr(method) as *const () as usize,
            immediate => return HandleKey::Immediate(immediate.clone()),
        };
        HandleKey::Heap {
            kind: value.kind(),
            addr,
        }
    }

    /// Returns whether the key identifies a heap allocation.
    pub fn is_heap(&self) -> bool {
        matches!(self, HandleKey::Heap { .. })
    }
}

/// A handle that does not keep its value reachable.
#[derive(Debug, Clone)]
pub enum WeakHandle {
    /// Immediates have no allocation and are always alive
    Immediate(PersistentValue),
    /// Weak string
    String(Weak<str>),
    /// Weak list
    List(Weak<Vec<PersistentValue>>),
    /// Weak map
    Map(Weak<BTreeMap<PersistentValue, PersistentValue>>),
    /// Weak tuple
    Tuple(Weak<[PersistentValue]>),
    /// Weak set
    Set(Weak<BTreeSet<PersistentValue>>),
    /// Weak multiset
    Multiset(Weak<BTreeMap<PersistentValue, usize>>),
    /// Weak byte buffer
    ByteBuffer(Weak<[u8]>),
    /// Weak cell
    Cell(Weak<PersistentCell>),
    /// Weak method
    Method(Weak<PersistentMethod>),
}

impl WeakHandle {
    /// Creates a weak handle to `value`.
    pub fn new(value: &PersistentValue) -> Self {
        match value {
            PersistentValue::String(s) => WeakHandle::String(Arc::downgrade(s)),
            PersistentValue::List(items) => WeakHandle::List(Arc::downgrade(items)),
            PersistentValue::Map(entries) => WeakHandle::Map(Arc::downgrade(entries)),
            PersistentValue::Tuple(items) => WeakHandle::Tuple(Arc::downgrade(items)),
            PersistentValue::Set(items) => WeakHandle::Set(Arc::downgrade(items)),
            PersistentValue::Multiset(counts) => WeakHandle::Multiset(Arc::downgrade(counts)),
            PersistentValue::ByteBuffer(bytes) => WeakHandle::ByteBuffer(Arc::downgrade(bytes)),
            PersistentValue::Cell(cell) => WeakHandle::Cell(Arc::downgrade(cell)),
            PersistentValue::Method(method) => WeakHandle::Method(Arc::downgrade(method)),
            immediate => WeakHandle::Immediate(immediate.clone()),
        }
    }

    /// Returns the value if it is still reachable.
    pub fn upgrade(&self) -> Option<PersistentValue> {
        match self {
            WeakHandle::Immediate(value) => Some(value.clone()),
            WeakHandle::String(w) => w.upgrade().map(PersistentValue::String),
            WeakHandle::List(w) => w.upgrade().map(PersistentValue::List),
            WeakHandle::Map(w) => w.upgrade().map(PersistentValue::Map),
            WeakHandle::Tuple(w) => w.upgrade().map(PersistentValue::Tuple),
            WeakHandle::Set(w) => w.upgrade().map(PersistentValue::Set),
            WeakHandle::Multiset(w) => w.upgrade().map(PersistentValue::Multiset),
            WeakHandle::ByteBuffer(w) => w.upgrade().map(PersistentValue::ByteBuffer),
            WeakHandle::Cell(w) => w.upgrade().map(PersistentValue::Cell),
            WeakHandle::Method(w) => w.upgrade().map(PersistentValue::Method),
        }
    }

    /// Returns whether the value is still reachable.
    pub fn is_alive(&self) -> bool {
        match self {
            WeakHandle::Immediate(_) => true,
            WeakHandle::String(w) => w.strong_count() > 0,
            WeakHandle::List(w) => w.strong_count() > 0,
            WeakHandle::Map(w) => w.strong_count() > 0,
            WeakHandle::Tuple(w) => w.strong_count() > 0,
            WeakHandle::Set(w) => w.strong_count() > 0,
            WeakHandle::Multiset(w) => w.strong_count() > 0,
            WeakHandle::ByteBuffer(w) => w.strong_count() > 0,
            WeakHandle::Cell(w) => w.strong_count() > 0,
            WeakHandle::Method(w) => w.strong_count() > 0,
        }
    }
}

impl PersistentValue {
    /// Creates a weak handle to this value.
    pub fn downgrade(&self) -> WeakHandle {
        WeakHandle::new(self)
    }
}
