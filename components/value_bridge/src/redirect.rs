//! Operation redirection.
//!
//! Host property reads, writes and calls on bridged objects are routed to the
//! persistent side. Dispatch is table driven: the pair
//! `(OperationKind, BridgeState)` selects a [`Handler`]. The bridge state is
//! decided once per operation by a single table lookup, and the handle found
//! by that lookup is what the handler sees.

use std::fmt;

use host_types::{HostObjectRef, HostValue};
use persistent_types::PersistentValue;

use crate::{BridgeError, ExecutionContext, RedirectResult};

/// Kind of a redirected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Property read
    GetProperty,
    /// Property write
    SetProperty,
    /// Function call
    Call,
}

impl OperationKind {
    /// All kinds, in table order.
    pub const ALL: [OperationKind; 3] = [
        OperationKind::GetProperty,
        OperationKind::SetProperty,
        OperationKind::Call,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Whether the target object has a bridge entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeState {
    /// No entry; host semantics apply
    NotBridged,
    /// Mapped to a persistent handle
    Bridged,
}

impl BridgeState {
    fn index(self) -> usize {
        self as usize
    }
}

/// A host operation awaiting dispatch.
#[derive(Clone, Copy)]
pub enum Operation<'a> {
    /// `object[key]`
    GetProperty {
        /// Target object
        object: &'a HostObjectRef,
        /// Property key
        key: &'a str,
    },
    /// `object[key] = value`
    SetProperty {
        /// Target object
        object: &'a HostObjectRef,
        /// Property key
        key: &'a str,
        /// Value written
        value: &'a HostValue,
    },
    /// `function.call(this, ...args)`
    Call {
        /// Callee
        function: &'a HostObjectRef,
        /// Receiver
        this: &'a HostValue,
        /// Arguments
        args: &'a [HostValue],
    },
}

impl<'a> Operation<'a> {
    /// The operation's kind.
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::GetProperty { .. } => OperationKind::GetProperty,
            Operation::SetProperty { .. } => OperationKind::SetProperty,
            Operation::Call { .. } => OperationKind::Call,
        }
    }

    /// The object whose bridge state selects the handler.
    pub fn target(&self) -> &'a HostObjectRef {
        match *self {
            Operation::GetProperty { object, .. } | Operation::SetProperty { object, .. } => object,
            Operation::Call { function, .. } => function,
        }
    }
}

impl fmt::Debug for Operation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::GetProperty { object, key } => {
                write!(f, "GetProperty({}, {:?})", object.identity(), key)
            }
            Operation::SetProperty { object, key, .. } => {
                write!(f, "SetProperty({}, {:?})", object.identity(), key)
            }
            Operation::Call { function, args, .. } => {
                write!(f, "Call({}, {} args)", function.identity(), args.len())
            }
        }
    }
}

/// Handles one `(OperationKind, BridgeState)` cell of the dispatch table.
///
/// The handle argument is the target's current handle when bridged.
pub type Handler =
    fn(&ExecutionContext, &Operation<'_>, Option<&PersistentValue>) -> RedirectResult<HostValue>;

/// Table-driven dispatcher for host operations.
#[derive(Clone)]
pub struct OperationRedirector {
    handlers: [[Handler; 2]; 3],
}

impl Default for OperationRedirector {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationRedirector {
    /// Creates a dispatcher with the standard handlers: host semantics for
    /// objects that are not bridged, persistent semantics with host fallback
    /// for bridged ones.
    pub fn new() -> Self {
        OperationRedirector {
            handlers: [
                [host_fallback as Handler, bridged_get as Handler],
                [host_fallback as Handler, bridged_set as Handler],
                [host_fallback as Handler, bridged_call as Handler],
            ],
        }
    }

    /// Returns the handler for a table cell.
    pub fn handler(&self, kind: OperationKind, state: BridgeState) -> Handler {
        self.handlers[kind.index()][state.index()]
    }

    /// Replaces the handler for a table cell, returning the previous one.
    pub fn set_handler(
        &mut self,
        kind: OperationKind,
        state: BridgeState,
        handler: Handler,
    ) -> Handler {
        std::mem::replace(&mut self.handlers[kind.index()][state.index()], handler)
    }

    /// Dispatches `op`.
    pub fn dispatch(&self, cx: &ExecutionContext, op: Operation<'_>) -> RedirectResult<HostValue> {
        let current = cx.table().lookup_by_host(op.target().identity())?;
        let state = match current {
            Some(_) => BridgeState::Bridged,
            None => BridgeState::NotBridged,
        };
        log::trace!("{}: dispatch {:?} as {:?}", cx.id(), op, state);
        self.handler(op.kind(), state)(cx, &op, current.as_ref())
    }
}

impl fmt::Debug for OperationRedirector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRedirector").finish_non_exhaustive()
    }
}

/// Host semantics for any operation.
pub fn host_fallback(
    _cx: &ExecutionContext,
    op: &Operation<'_>,
    _current: Option<&PersistentValue>,
) -> RedirectResult<HostValue> {
    match *op {
        Operation::GetProperty { object, key } => Ok(object.get_property(key)),
        Operation::SetProperty { object, key, value } => {
            object.set_property(key, value.clone())?;
            Ok(value.clone())
        }
        Operation::Call {
            function,
            this,
            args,
        } => Ok(function.call(this, args)?),
    }
}

fn bridged_get(
    cx: &ExecutionContext,
    op: &Operation<'_>,
    current: Option<&PersistentValue>,
) -> RedirectResult<HostValue> {
    let (Operation::GetProperty { key, .. }, Some(handle)) = (*op, current) else {
        return host_fallback(cx, op, current);
    };
    match persistent_property(handle, key) {
        Some(attribute) => cx.export(&attribute),
        None => host_fallback(cx, op, current),
    }
}

fn bridged_set(
    cx: &ExecutionContext,
    op: &Operation<'_>,
    current: Option<&PersistentValue>,
) -> RedirectResult<HostValue> {
    let Operation::SetProperty { object, key, value } = *op else {
        return host_fallback(cx, op, current);
    };
    let identity = object.identity();
    let incoming = cx.import(value)?;
    // Read-modify-write under the table lock.
    cx.table().modify_handle(identity, |handle| match handle.as_cell() {
        Some(cell) if cell.is_mutable() => handle
            .set_attribute(key, incoming)
            .map_err(|_| BridgeError::ImmutableTarget { identity }),
        _ => Err(BridgeError::ImmutableTarget { identity }),
    })?;
    Ok(value.clone())
}

fn bridged_call(
    cx: &ExecutionContext,
    op: &Operation<'_>,
    current: Option<&PersistentValue>,
) -> RedirectResult<HostValue> {
    let (Operation::Call { this, args, .. }, Some(handle @ PersistentValue::Method(_))) =
        (*op, current)
    else {
        return host_fallback(cx, op, current);
    };
    let this = cx.import(this)?;
    let args = args
        .iter()
        .map(|arg| cx.import(arg))
        .collect::<Result<Vec<_>, _>>()?;
    let result = handle.invoke(&this, &args)?;
    cx.export(&result)
}

/// Reads `key` from a persistent handle, or `None` if the handle has no such
/// property.
pub fn persistent_property(handle: &PersistentValue, key: &str) -> Option<PersistentValue> {
    match handle {
        PersistentValue::Cell(_) => handle.get_attribute(key),
        PersistentValue::List(_) | PersistentValue::Tuple(_) => {
            let items = handle.as_list().or_else(|| handle.as_tuple())?;
            if key == "length" {
                return Some(PersistentValue::Integer(items.len() as i64));
            }
            array_index(key).and_then(|index| items.get(index).cloned())
        }
        PersistentValue::Map(entries) => entries
            .get(&PersistentValue::string(key))
            .or_else(|| {
                array_index(key)
                    .and_then(|index| entries.get(&PersistentValue::Integer(index as i64)))
            })
            .cloned(),
        _ => None,
    }
}

fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}
