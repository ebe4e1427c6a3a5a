//! Per-context object realm.
//!
//! A realm allocates host objects and hands out their identities. It keeps a
//! weak index from identity to object so the bridge can return the original
//! host object for a persistent handle without extending its lifetime.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::object::{ExternalResource, FunctionBody, FunctionData, HostObject, ObjectKind};
use crate::{HostIdentity, HostObjectRef, HostResult, HostValue};

/// Allocator and weak identity index for one execution context.
#[derive(Debug)]
pub struct HostRealm {
    /// Next identity to hand out
    next_identity: Cell<u64>,
    /// Weak index of every object allocated by this realm
    objects: RefCell<HashMap<HostIdentity, Weak<HostObject>>>,
    /// Index size that triggers the next sweep of dead slots
    prune_at: Cell<usize>,
}

/// Smallest index size that triggers a sweep.
const MIN_PRUNE_AT: usize = 64;

impl HostRealm {
    /// Creates an empty realm.
    pub fn new() -> Self {
        HostRealm {
            next_identity: Cell::new(1),
            objects: RefCell::new(HashMap::new()),
            prune_at: Cell::new(MIN_PRUNE_AT),
        }
    }

    /// Allocates an object of the given kind.
    pub fn alloc(&self, kind: ObjectKind) -> HostObjectRef {
        let identity = HostIdentity::from_raw(self.next_identity.get());
        self.next_identity.set(identity.raw() + 1);
        let obj = Rc::new(HostObject::new(identity, kind));
        let mut objects = self.objects.borrow_mut();
        if objects.len() >= self.prune_at.get() {
            objects.retain(|_, weak| weak.strong_count() > 0);
            self.prune_at.set((objects.len() * 2).max(MIN_PRUNE_AT));
        }
        objects.insert(identity, Rc::downgrade(&obj));
        obj
    }

    /// Returns the number of index slots, live or dead.
    pub fn index_len(&self) -> usize {
        self.objects.borrow().len()
    }

    /// Resolves an identity to its object if the object is still alive.
    pub fn resolve(&self, identity: HostIdentity) -> Option<HostObjectRef> {
        let mut objects = self.objects.borrow_mut();
        match objects.get(&identity).map(Weak::upgrade) {
            Some(Some(obj)) => Some(obj),
            Some(None) => {
                objects.remove(&identity);
                None
            }
            None => None,
        }
    }

    /// Returns the number of live objects, pruning dead index slots.
    pub fn live_count(&self) -> usize {
        let mut objects = self.objects.borrow_mut();
        objects.retain(|_, weak| weak.strong_count() > 0);
        objects.len()
    }

    /// Creates a plain object with the given properties.
    pub fn new_object(&self, properties: Vec<(String, HostValue)>) -> HostObjectRef {
        self.alloc(ObjectKind::Plain {
            properties,
            frozen: false,
        })
    }

    /// Creates a dense array.
    pub fn new_array(&self, elements: Vec<HostValue>) -> HostObjectRef {
        self.alloc(ObjectKind::Array {
            elements: elements.into_iter().map(Some).collect(),
            frozen: false,
        })
    }

    /// Creates an array that may contain holes.
    pub fn new_sparse_array(&self, elements: Vec<Option<HostValue>>) -> HostObjectRef {
        self.alloc(ObjectKind::Array {
            elements,
            frozen: false,
        })
    }

    /// Creates a native function.
    pub fn new_function<F>(&self, name: &str, body: F) -> HostObjectRef
    where
        F: Fn(&HostValue, &[HostValue]) -> HostResult<HostValue> + 'static,
    {
        self.alloc(ObjectKind::Function(FunctionData {
            name: name.to_string(),
            body: FunctionBody::Native(Rc::new(body)),
        }))
    }

    /// Creates a function placeholder with no host body.
    pub fn new_placeholder_function(&self, name: &str) -> HostObjectRef {
        self.alloc(ObjectKind::Function(FunctionData {
            name: name.to_string(),
            body: FunctionBody::Placeholder,
        }))
    }

    /// Creates a date from milliseconds since the epoch.
    pub fn new_date(&self, millis: f64) -> HostObjectRef {
        self.alloc(ObjectKind::Date(millis))
    }

    /// Creates a map from entries in insertion order.
    pub fn new_map(&self, entries: Vec<(HostValue, HostValue)>) -> HostObjectRef {
        self.alloc(ObjectKind::Map(entries))
    }

    /// Creates a set from values in insertion order.
    pub fn new_set(&self, values: Vec<HostValue>) -> HostObjectRef {
        self.alloc(ObjectKind::Set(values))
    }

    /// Creates an array buffer.
    pub fn new_array_buffer(&self, bytes: Vec<u8>) -> HostObjectRef {
        self.alloc(ObjectKind::ArrayBuffer(bytes))
    }

    /// Creates an object wrapping a native resource.
    pub fn new_external(&self, resource: ExternalResource) -> HostObjectRef {
        self.alloc(ObjectKind::External(resource))
    }
}

impl Default for HostRealm {
    fn default() -> Self {
        Self::new()
    }
}
