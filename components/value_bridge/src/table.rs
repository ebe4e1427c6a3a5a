//! Bridge table: the bidirectional map between host identities and
//! persistent handles for one execution context.
//!
//! All state sits behind a single non-reentrant lock. Every public method
//! takes the lock exactly once and works on the locked state through private
//! helpers, so no code path ever re-acquires it. The table stores identities
//! and persistent handles only, never host values, which keeps host
//! finalization (which calls back into the table) free of lock cycles.

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use host_types::HostIdentity;
use persistent_types::{HandleKey, PersistentValue, WeakHandle};

use crate::{BridgeError, BridgeResult, BridgeStats};

/// Identifier of an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(u64);

impl ContextId {
    /// Builds a context id from its raw value.
    pub const fn from_raw(raw: u64) -> Self {
        ContextId(raw)
    }

    /// Returns the raw value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// No entry existed for the identity
    Inserted,
    /// An existing entry was replaced
    Replaced,
}

/// Snapshot of one bridge entry.
#[derive(Debug, Clone)]
pub struct BridgeEntry {
    /// Host identity
    pub identity: HostIdentity,
    /// Current persistent handle
    pub handle: PersistentValue,
    /// Pinned for the lifetime of the entry
    pub is_root: bool,
    /// Does not keep the handle reachable
    pub is_weak: bool,
    /// Creation time
    pub created_at: Instant,
}

enum HandleRef {
    Pinned(PersistentValue),
    Observed(WeakHandle),
}

struct Slot {
    handle: HandleRef,
    key: HandleKey,
    is_root: bool,
    is_weak: bool,
    created_at: Instant,
}

impl Slot {
    fn new(handle: PersistentValue, is_weak: bool, is_root: bool, created_at: Instant) -> Self {
        let key = handle.handle_key();
        let handle = if is_root || !is_weak {
            HandleRef::Pinned(handle)
        } else {
            HandleRef::Observed(handle.downgrade())
        };
        Slot {
            handle,
            key,
            is_root,
            is_weak,
            created_at,
        }
    }

    fn current(&self) -> Option<PersistentValue> {
        match &self.handle {
            HandleRef::Pinned(value) => Some(value.clone()),
            HandleRef::Observed(weak) => weak.upgrade(),
        }
    }

    fn is_alive(&self) -> bool {
        match &self.handle {
            HandleRef::Pinned(_) => true,
            HandleRef::Observed(weak) => weak.is_alive(),
        }
    }

    /// Pins or unpins the handle so that it is held strongly exactly when the
    /// entry is rooted or not weak. Returns false if a weak handle died.
    fn repin(&mut self) -> bool {
        let pinned = self.is_root || !self.is_weak;
        let next = match (&self.handle, pinned) {
            (HandleRef::Observed(weak), true) => match weak.upgrade() {
                Some(value) => HandleRef::Pinned(value),
                None => return false,
            },
            (HandleRef::Pinned(value), false) => HandleRef::Observed(value.downgrade()),
            _ => return true,
        };
        self.handle = next;
        true
    }

    fn set_handle(&mut self, handle: PersistentValue) {
        self.key = handle.handle_key();
        self.handle = if self.is_root || !self.is_weak {
            HandleRef::Pinned(handle)
        } else {
            HandleRef::Observed(handle.downgrade())
        };
    }

    fn snapshot(&self, identity: HostIdentity) -> Option<BridgeEntry> {
        Some(BridgeEntry {
            identity,
            handle: self.current()?,
            is_root: self.is_root,
            is_weak: self.is_weak,
            created_at: self.created_at,
        })
    }
}

#[derive(Default)]
struct TableState {
    torn_down: bool,
    forward: HashMap<HostIdentity, Slot>,
    reverse: HashMap<HandleKey, HostIdentity>,
}

impl TableState {
    fn remove(&mut self, identity: HostIdentity) -> Option<Slot> {
        let slot = self.forward.remove(&identity)?;
        if self.reverse.get(&slot.key) == Some(&identity) {
            self.reverse.remove(&slot.key);
        }
        Some(slot)
    }

    /// Returns the live slot for `identity`, dropping it first if it is a
    /// weak entry whose handle died.
    fn live_slot(&mut self, identity: HostIdentity) -> Option<&mut Slot> {
        let alive = self.forward.get(&identity)?.is_alive();
        if !alive {
            self.remove(identity);
            return None;
        }
        self.forward.get_mut(&identity)
    }

    /// Fails with `DuplicateRegistration` if `key` is reverse-mapped to a live
    /// entry other than `identity`.
    fn check_reverse(&mut self, identity: HostIdentity, key: &HandleKey) -> BridgeResult<()> {
        if !key.is_heap() {
            return Ok(());
        }
        match self.reverse.get(key).copied() {
            Some(existing) if existing != identity => {
                if self.live_slot(existing).is_some() {
                    return Err(BridgeError::DuplicateRegistration { identity, existing });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn link(&mut self, identity: HostIdentity, key: HandleKey) {
        if key.is_heap() {
            self.reverse.insert(key, identity);
        }
    }

    fn unlink(&mut self, identity: HostIdentity) {
        if let Some(slot) = self.forward.get(&identity) {
            if self.reverse.get(&slot.key) == Some(&identity) {
                let key = slot.key.clone();
                self.reverse.remove(&key);
            }
        }
    }

    fn insert(
        &mut self,
        identity: HostIdentity,
        handle: PersistentValue,
        is_weak: bool,
    ) -> BridgeResult<Registration> {
        let key = handle.handle_key();
        self.check_reverse(identity, &key)?;

        let registration = match self.forward.get(&identity) {
            Some(existing) if !existing.is_weak && is_weak => {
                return Err(BridgeError::DuplicateRegistration {
                    identity,
                    existing: identity,
                });
            }
            Some(_) => Registration::Replaced,
            None => Registration::Inserted,
        };

        self.unlink(identity);
        // Replacement keeps the root flag and age of the entry.
        let (is_root, created_at) = self
            .forward
            .get(&identity)
            .map(|previous| (previous.is_root, previous.created_at))
            .unwrap_or((false, Instant::now()));
        self.link(identity, key);
        self.forward
            .insert(identity, Slot::new(handle, is_weak, is_root, created_at));
        Ok(registration)
    }

    fn swap(
        &mut self,
        identity: HostIdentity,
        handle: PersistentValue,
    ) -> BridgeResult<PersistentValue> {
        let previous = self
            .live_slot(identity)
            .and_then(|slot| slot.current())
            .ok_or(BridgeError::UnknownIdentity { identity })?;
        let key = handle.handle_key();
        self.check_reverse(identity, &key)?;

        self.unlink(identity);
        if let Some(slot) = self.forward.get_mut(&identity) {
            slot.set_handle(handle);
        }
        self.link(identity, key);
        Ok(previous)
    }

    fn prune_dead(&mut self) -> usize {
        let dead: Vec<HostIdentity> = self
            .forward
            .iter()
            .filter(|(_, slot)| !slot.is_alive())
            .map(|(identity, _)| *identity)
            .collect();
        for identity in &dead {
            self.remove(*identity);
        }
        dead.len()
    }
}

/// Bidirectional map between host identities and persistent handles.
///
/// A table belongs to exactly one execution context. It is `Send + Sync`
/// and every operation is atomic with respect to every other.
pub struct BridgeTable {
    context: ContextId,
    state: Mutex<TableState>,
}

impl BridgeTable {
    /// Creates an empty table for `context`.
    pub fn new(context: ContextId) -> Self {
        BridgeTable {
            context,
            state: Mutex::new(TableState::default()),
        }
    }

    /// The owning context.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Returns false once the table has been torn down.
    pub fn is_live(&self) -> bool {
        !self.state.lock().torn_down
    }

    fn lock(&self) -> BridgeResult<MutexGuard<'_, TableState>> {
        let state = self.state.lock();
        if state.torn_down {
            return Err(BridgeError::ContextNotFound {
                context: self.context,
            });
        }
        Ok(state)
    }

    /// Inserts or replaces the strong mapping `identity -> handle`.
    ///
    /// The root flag is never set here; a replaced entry keeps its existing
    /// root flag. Fails with `DuplicateRegistration` if the handle is already
    /// mapped from a different live identity.
    ///
    /// # Arguments
    ///
    /// * `identity` - Host identity being bridged
    /// * `handle` - Persistent handle it maps to
    pub fn register_mapping(
        &self,
        identity: HostIdentity,
        handle: PersistentValue,
    ) -> BridgeResult<Registration> {
        let mut state = self.lock()?;
        let registration = state.insert(identity, handle, false)?;
        log::trace!(
            "{}: {:?} mapping for {}",
            self.context,
            registration,
            identity
        );
        Ok(registration)
    }

    /// Registers a weak mapping that does not keep `handle` reachable.
    ///
    /// Fails with `DuplicateRegistration` if a non-weak entry exists for the
    /// identity.
    pub fn register_weak(
        &self,
        identity: HostIdentity,
        handle: PersistentValue,
    ) -> BridgeResult<Registration> {
        let mut state = self.lock()?;
        state.insert(identity, handle, true)
    }

    /// Removes the entry for `identity` and its reverse mapping.
    ///
    /// A rooted entry is unrooted as part of the removal.
    pub fn unregister_mapping(&self, identity: HostIdentity) -> BridgeResult<()> {
        let mut state = self.lock()?;
        match state.remove(identity) {
            Some(slot) => {
                if slot.is_root {
                    log::debug!("{}: removing rooted entry {}", self.context, identity);
                }
                Ok(())
            }
            None => Err(BridgeError::UnknownIdentity { identity }),
        }
    }

    /// Removes a weak entry.
    ///
    /// Returns `Ok(false)` and leaves the entry in place if it is not weak.
    pub fn unregister_weak(&self, identity: HostIdentity) -> BridgeResult<bool> {
        let mut state = self.lock()?;
        match state.forward.get(&identity) {
            Some(slot) if slot.is_weak => {
                state.remove(identity);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(BridgeError::UnknownIdentity { identity }),
        }
    }

    /// Returns the current handle for `identity`.
    pub fn lookup_by_host(&self, identity: HostIdentity) -> BridgeResult<Option<PersistentValue>> {
        let mut state = self.lock()?;
        Ok(state.live_slot(identity).and_then(|slot| slot.current()))
    }

    /// Returns the identity currently mapped to `handle`.
    ///
    /// Only heap handles are reverse-mapped; immediates always yield `None`.
    pub fn lookup_by_persistent(
        &self,
        handle: &PersistentValue,
    ) -> BridgeResult<Option<HostIdentity>> {
        let mut state = self.lock()?;
        let key = handle.handle_key();
        let Some(identity) = state.reverse.get(&key).copied() else {
            return Ok(None);
        };
        Ok(state
            .live_slot(identity)
            .filter(|slot| slot.key == key)
            .map(|_| identity))
    }

    /// Atomically replaces the handle of an existing entry, keeping the
    /// reverse map consistent. Returns the previous handle.
    pub fn swap_handle(
        &self,
        identity: HostIdentity,
        handle: PersistentValue,
    ) -> BridgeResult<PersistentValue> {
        let mut state = self.lock()?;
        state.swap(identity, handle)
    }

    /// Atomically derives a new handle from the current one and installs it.
    ///
    /// `update` runs under the table lock and must not call back into the
    /// table. Returns the installed handle.
    pub fn modify_handle<F>(&self, identity: HostIdentity, update: F) -> BridgeResult<PersistentValue>
    where
        F: FnOnce(&PersistentValue) -> BridgeResult<PersistentValue>,
    {
        let mut state = self.lock()?;
        let current = state
            .live_slot(identity)
            .and_then(|slot| slot.current())
            .ok_or(BridgeError::UnknownIdentity { identity })?;
        let next = update(&current)?;
        state.swap(identity, next.clone())?;
        Ok(next)
    }

    /// Sets or clears the root flag, returning the previous flag.
    ///
    /// Rooting a weak entry pins its handle; if the handle has already died
    /// the entry is dropped and the call fails with `UnknownIdentity`.
    pub fn set_root(&self, identity: HostIdentity, rooted: bool) -> BridgeResult<bool> {
        let mut state = self.lock()?;
        let slot = state
            .forward
            .get_mut(&identity)
            .ok_or(BridgeError::UnknownIdentity { identity })?;
        let previous = slot.is_root;
        slot.is_root = rooted;
        if !slot.repin() {
            state.remove(identity);
            return Err(BridgeError::UnknownIdentity { identity });
        }
        Ok(previous)
    }

    /// Snapshot of the entry for `identity`.
    pub fn entry(&self, identity: HostIdentity) -> BridgeResult<Option<BridgeEntry>> {
        let mut state = self.lock()?;
        Ok(state
            .live_slot(identity)
            .and_then(|slot| slot.snapshot(identity)))
    }

    /// Snapshot of every live entry, ordered by identity.
    pub fn entries(&self) -> BridgeResult<Vec<BridgeEntry>> {
        let mut state = self.lock()?;
        state.prune_dead();
        let mut entries: Vec<BridgeEntry> = state
            .forward
            .iter()
            .filter_map(|(identity, slot)| slot.snapshot(*identity))
            .collect();
        entries.sort_by_key(|entry| entry.identity);
        Ok(entries)
    }

    /// Visits the handle of every rooted entry.
    ///
    /// This is the root-scan hook for the persistent engine's collector:
    /// every handle visited must be treated as reachable. Returns the number
    /// of roots visited.
    pub fn for_each_root<F>(&self, mut visit: F) -> BridgeResult<usize>
    where
        F: FnMut(HostIdentity, &PersistentValue),
    {
        let state = self.lock()?;
        let mut visited = 0;
        for (identity, slot) in state.forward.iter().filter(|(_, slot)| slot.is_root) {
            if let HandleRef::Pinned(handle) = &slot.handle {
                visit(*identity, handle);
                visited += 1;
            }
        }
        Ok(visited)
    }

    /// Drops weak entries whose handles are no longer reachable.
    pub fn prune_weak(&self) -> BridgeResult<usize> {
        let mut state = self.lock()?;
        let pruned = state.prune_dead();
        if pruned > 0 {
            log::debug!("{}: pruned {} dead weak entries", self.context, pruned);
        }
        Ok(pruned)
    }

    /// Counters for the live entries.
    pub fn stats(&self) -> BridgeResult<BridgeStats> {
        let mut state = self.lock()?;
        state.prune_dead();
        Ok(BridgeStats {
            count: state.forward.len(),
            root_count: state.forward.values().filter(|s| s.is_root).count(),
            weak_count: state.forward.values().filter(|s| s.is_weak).count(),
            reverse_count: state.reverse.len(),
        })
    }

    /// Number of entries, including weak entries not yet pruned.
    pub fn len(&self) -> usize {
        self.state.lock().forward.len()
    }

    /// Returns true when the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry and marks the table torn down.
    ///
    /// Later operations fail with `ContextNotFound`. Returns the number of
    /// entries released.
    pub fn teardown(&self) -> BridgeResult<usize> {
        let mut state = self.lock()?;
        let released = state.forward.len();
        let roots = state.forward.values().filter(|s| s.is_root).count();
        state.forward.clear();
        state.reverse.clear();
        state.torn_down = true;
        log::debug!(
            "{}: torn down, released {} entries ({} rooted)",
            self.context,
            released,
            roots
        );
        Ok(released)
    }
}

impl fmt::Debug for BridgeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BridgeTable")
            .field("context", &self.context)
            .field("entries", &state.forward.len())
            .field("torn_down", &state.torn_down)
            .finish()
    }
}
