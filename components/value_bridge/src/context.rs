//! Execution contexts and the context registry.
//!
//! An [`ExecutionContext`] owns one host realm and the bridge state for it:
//! a [`BridgeTable`], its [`RootCoordinator`], the native resource side table
//! and the operation dispatcher. Contexts are independent; nothing is shared
//! between them except through the [`BridgeRegistry`] that addresses tables
//! by [`ContextId`].

use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use host_types::{HostIdentity, HostObjectRef, HostRealm, HostValue};
use persistent_types::PersistentValue;

use crate::converter::ValueConverter;
use crate::redirect::{Operation, OperationRedirector};
use crate::resources::{NativeResourceTable, ResourceHandle};
use crate::{
    BridgeConfig, BridgeError, BridgeResult, BridgeStats, BridgeTable, ContextId,
    ConversionResult, LeakReport, RedirectResult, Registration, RootCoordinator,
};

/// One host realm bridged to the persistent engine.
///
/// Dropping the context tears down its bridge table.
pub struct ExecutionContext {
    id: ContextId,
    config: BridgeConfig,
    realm: HostRealm,
    resources: NativeResourceTable,
    table: Arc<BridgeTable>,
    roots: RootCoordinator,
    redirector: OperationRedirector,
    /// Objects carrying this context's finalization hook
    watched: Rc<RefCell<HashSet<HostIdentity>>>,
}

impl ExecutionContext {
    /// Creates a standalone context.
    pub fn new(id: ContextId, config: BridgeConfig) -> Self {
        Self::with_table(Arc::new(BridgeTable::new(id)), config)
    }

    fn with_table(table: Arc<BridgeTable>, config: BridgeConfig) -> Self {
        log::debug!("{}: opened", table.context());
        ExecutionContext {
            id: table.context(),
            config,
            realm: HostRealm::new(),
            resources: NativeResourceTable::new(),
            roots: RootCoordinator::new(Arc::clone(&table)),
            table,
            redirector: OperationRedirector::new(),
            watched: Rc::new(RefCell::new(HashSet::new())),
        }
    }

    /// Context id.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Bridge configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The host realm objects of this context are allocated in.
    pub fn realm(&self) -> &HostRealm {
        &self.realm
    }

    /// The bridge table.
    pub fn table(&self) -> &Arc<BridgeTable> {
        &self.table
    }

    /// The root coordinator.
    pub fn roots(&self) -> &RootCoordinator {
        &self.roots
    }

    /// The native resource side table.
    pub fn resources(&self) -> &NativeResourceTable {
        &self.resources
    }

    /// The operation dispatcher, for installing custom handlers.
    pub fn redirector_mut(&mut self) -> &mut OperationRedirector {
        &mut self.redirector
    }

    /// A converter bound to this context.
    pub fn converter(&self) -> ValueConverter<'_> {
        ValueConverter::new(&self.config, &self.realm, &self.resources)
    }

    /// Maps `object` to `handle` and arranges for the entry to be removed
    /// when the host engine finalizes the object.
    ///
    /// Entries created by identity alone, through the [`RootCoordinator`] or
    /// the [`BridgeRegistry`], get their hook the next time the object passes
    /// through this context.
    pub fn attach(
        &self,
        object: &HostObjectRef,
        handle: PersistentValue,
    ) -> BridgeResult<Registration> {
        let registration = self.table.register_mapping(object.identity(), handle)?;
        self.watch(object);
        Ok(registration)
    }

    /// Registers a weak entry for `object`, removed when the host engine
    /// finalizes the object.
    pub fn register_weak(
        &self,
        object: &HostObjectRef,
        handle: PersistentValue,
    ) -> BridgeResult<Registration> {
        let registration = self.roots.register_weak(object.identity(), handle)?;
        self.watch(object);
        Ok(registration)
    }

    /// Installs the finalization hook on `object` unless it already has one.
    fn watch(&self, object: &HostObjectRef) {
        let identity = object.identity();
        if !self.watched.borrow_mut().insert(identity) {
            return;
        }
        let finalized = self.roots.finalization_hook();
        let watched = Rc::downgrade(&self.watched);
        object.on_finalize(move |identity| {
            finalized(identity);
            if let Some(watched) = watched.upgrade() {
                watched.borrow_mut().remove(&identity);
            }
        });
    }

    /// Bridges a host object, converting it unless it is already mapped.
    /// Returns the object's current handle.
    pub fn bridge_object(&self, object: &HostObjectRef) -> RedirectResult<PersistentValue> {
        if let Some(current) = self.table.lookup_by_host(object.identity())? {
            self.watch(object);
            return Ok(current);
        }
        let handle = self.import(&HostValue::Object(object.clone()))?;
        self.attach(object, handle.clone())?;
        Ok(handle)
    }

    /// Bridges any host value. Primitives have no identity and are only
    /// converted.
    pub fn bridge(&self, value: &HostValue) -> RedirectResult<PersistentValue> {
        match value {
            HostValue::Object(object) => self.bridge_object(object),
            primitive => Ok(self.converter().from_host(primitive)?),
        }
    }

    /// Converts a host value, reusing the current handle of every bridged
    /// object it reaches.
    pub fn import(&self, value: &HostValue) -> ConversionResult<PersistentValue> {
        let table = &self.table;
        let lookup = |identity: HostIdentity| table.lookup_by_host(identity).ok().flatten();
        self.converter().from_host_with(value, &lookup)
    }

    /// Materializes a persistent value on the host side.
    ///
    /// A composite handle that is already mapped returns its original host
    /// object when identity preservation is on; otherwise a fresh host object
    /// is built and mapped to the handle.
    pub fn export(&self, handle: &PersistentValue) -> RedirectResult<HostValue> {
        if !handle.is_composite() {
            return Ok(self.converter().to_host(handle)?);
        }
        if self.config.preserve_identity {
            if let Some(identity) = self.table.lookup_by_persistent(handle)? {
                if let Some(object) = self.realm.resolve(identity) {
                    self.watch(&object);
                    return Ok(HostValue::Object(object));
                }
            }
        }
        let value = self.converter().to_host(handle)?;
        if let HostValue::Object(object) = &value {
            match self.attach(object, handle.clone()) {
                Ok(_) => {}
                Err(BridgeError::DuplicateRegistration { existing, .. }) => {
                    log::debug!(
                        "{}: {} already maps this handle; {} left unbridged",
                        self.id,
                        existing,
                        object.identity()
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(value)
    }

    /// `object[key]` through the dispatcher.
    pub fn get_property(&self, object: &HostObjectRef, key: &str) -> RedirectResult<HostValue> {
        self.redirector
            .dispatch(self, Operation::GetProperty { object, key })
    }

    /// `object[key] = value` through the dispatcher. Returns the value
    /// written.
    pub fn set_property(
        &self,
        object: &HostObjectRef,
        key: &str,
        value: &HostValue,
    ) -> RedirectResult<HostValue> {
        self.redirector
            .dispatch(self, Operation::SetProperty { object, key, value })
    }

    /// Calls `function` through the dispatcher.
    pub fn call(
        &self,
        function: &HostObjectRef,
        this: &HostValue,
        args: &[HostValue],
    ) -> RedirectResult<HostValue> {
        self.redirector.dispatch(
            self,
            Operation::Call {
                function,
                this,
                args,
            },
        )
    }

    /// Frees the native resource referenced by a `Cell{External}` handle.
    /// Returns false if the handle is not an external cell or was already
    /// released.
    pub fn release_resource(&self, handle: &PersistentValue) -> bool {
        handle
            .as_cell()
            .filter(|cell| cell.class() == persistent_types::CellClass::External)
            .and_then(|cell| cell.get("handle").and_then(PersistentValue::as_integer))
            .and_then(ResourceHandle::from_raw)
            .and_then(|raw| self.resources.release(raw))
            .is_some()
    }

    /// Table counters.
    pub fn stats(&self) -> BridgeResult<BridgeStats> {
        self.table.stats()
    }

    /// Leak scan using the configured age threshold.
    pub fn detect_leaks_default(&self) -> BridgeResult<LeakReport> {
        self.roots.detect_leaks(self.config.leak_age_threshold())
    }

    /// Releases every entry and native resource. Later bridge operations on
    /// this context fail with `ContextNotFound`.
    pub fn teardown(&self) -> BridgeResult<usize> {
        let released = self.table.teardown()?;
        self.resources.clear();
        Ok(released)
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        if self.table.is_live() {
            let _ = self.teardown();
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("table", &self.table)
            .field("live_objects", &self.realm.live_count())
            .finish()
    }
}

/// Addresses the bridge tables of many contexts by id.
///
/// The registry is `Send + Sync`; it can be shared between the threads that
/// each run their own [`ExecutionContext`].
#[derive(Debug)]
pub struct BridgeRegistry {
    config: BridgeConfig,
    next_id: AtomicU64,
    tables: Mutex<HashMap<ContextId, Arc<BridgeTable>>>,
}

impl Default for BridgeRegistry {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl BridgeRegistry {
    /// Creates a registry whose contexts use `config`.
    pub fn new(config: BridgeConfig) -> Self {
        BridgeRegistry {
            config,
            next_id: AtomicU64::new(1),
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a new context with a fresh id.
    pub fn open(&self) -> ExecutionContext {
        let id = ContextId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        let table = Arc::new(BridgeTable::new(id));
        self.tables.lock().insert(id, Arc::clone(&table));
        ExecutionContext::with_table(table, self.config.clone())
    }

    /// The table of a live context.
    pub fn table(&self, context: ContextId) -> BridgeResult<Arc<BridgeTable>> {
        let mut tables = self.tables.lock();
        match tables.get(&context) {
            Some(table) if table.is_live() => Ok(Arc::clone(table)),
            Some(_) => {
                tables.remove(&context);
                Err(BridgeError::ContextNotFound { context })
            }
            None => Err(BridgeError::ContextNotFound { context }),
        }
    }

    /// The root coordinator of a live context.
    pub fn coordinator(&self, context: ContextId) -> BridgeResult<RootCoordinator> {
        Ok(RootCoordinator::new(self.table(context)?))
    }

    /// See [`BridgeTable::register_mapping`].
    pub fn register_mapping(
        &self,
        context: ContextId,
        identity: HostIdentity,
        handle: PersistentValue,
    ) -> BridgeResult<Registration> {
        self.table(context)?.register_mapping(identity, handle)
    }

    /// See [`BridgeTable::unregister_mapping`].
    pub fn unregister_mapping(&self, context: ContextId, identity: HostIdentity) -> BridgeResult<()> {
        self.table(context)?.unregister_mapping(identity)
    }

    /// See [`BridgeTable::lookup_by_host`].
    pub fn lookup_by_host(
        &self,
        context: ContextId,
        identity: HostIdentity,
    ) -> BridgeResult<Option<PersistentValue>> {
        self.table(context)?.lookup_by_host(identity)
    }

    /// See [`BridgeTable::lookup_by_persistent`].
    pub fn lookup_by_persistent(
        &self,
        context: ContextId,
        handle: &PersistentValue,
    ) -> BridgeResult<Option<HostIdentity>> {
        self.table(context)?.lookup_by_persistent(handle)
    }

    /// Tears down a context's table and forgets it.
    pub fn teardown(&self, context: ContextId) -> BridgeResult<usize> {
        let table = self
            .tables
            .lock()
            .remove(&context)
            .ok_or(BridgeError::ContextNotFound { context })?;
        table.teardown()
    }

    /// Ids of the live contexts, ascending.
    pub fn contexts(&self) -> Vec<ContextId> {
        let mut tables = self.tables.lock();
        tables.retain(|_, table| table.is_live());
        let mut ids: Vec<ContextId> = tables.keys().copied().collect();
        ids.sort();
        ids
    }
}
