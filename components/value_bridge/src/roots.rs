//! Root coordination between the two collectors.
//!
//! A rooted entry pins its persistent handle: the persistent engine must not
//! reclaim it while the flag is set. Liveness of host objects is never
//! inferred by inspecting values; the host engine reports it through
//! [`RootCoordinator::host_finalized`], normally via the hook returned by
//! [`RootCoordinator::finalization_hook`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use host_types::HostIdentity;
use persistent_types::PersistentValue;

use crate::{
    BridgeError, BridgeResult, BridgeStats, BridgeTable, ContextId, LeakReport, LeakWarning,
    Registration,
};

/// Root and weak-reference management for one bridge table.
///
/// Cloning is cheap; clones address the same table.
#[derive(Debug, Clone)]
pub struct RootCoordinator {
    table: Arc<BridgeTable>,
}

impl RootCoordinator {
    /// Creates a coordinator over `table`.
    pub fn new(table: Arc<BridgeTable>) -> Self {
        RootCoordinator { table }
    }

    /// The context this coordinator serves.
    pub fn context(&self) -> ContextId {
        self.table.context()
    }

    /// The underlying table.
    pub fn table(&self) -> &Arc<BridgeTable> {
        &self.table
    }

    /// Sets the root flag on an existing entry.
    ///
    /// Fails with `UnknownIdentity` if no entry exists: rooting never
    /// creates a mapping.
    pub fn register_root(&self, identity: HostIdentity) -> BridgeResult<()> {
        self.table.set_root(identity, true)?;
        log::trace!("{}: rooted {}", self.context(), identity);
        Ok(())
    }

    /// Clears the root flag. Unknown identities are ignored.
    pub fn unregister_root(&self, identity: HostIdentity) -> BridgeResult<()> {
        match self.table.set_root(identity, false) {
            Ok(_) | Err(BridgeError::UnknownIdentity { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Registers a weak entry that does not keep `handle` reachable.
    pub fn register_weak(
        &self,
        identity: HostIdentity,
        handle: PersistentValue,
    ) -> BridgeResult<Registration> {
        self.table.register_weak(identity, handle)
    }

    /// Removes a weak entry. Unknown identities and non-weak entries are
    /// left alone.
    pub fn unregister_weak(&self, identity: HostIdentity) -> BridgeResult<()> {
        match self.table.unregister_weak(identity) {
            Ok(_) | Err(BridgeError::UnknownIdentity { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Reports that the host engine finalized `identity`.
    ///
    /// Removes the entry (unrooting it first). Idempotent; an identity that
    /// was never bridged is ignored.
    pub fn host_finalized(&self, identity: HostIdentity) -> BridgeResult<()> {
        match self.table.unregister_mapping(identity) {
            Ok(()) => {
                log::trace!("{}: {} finalized", self.context(), identity);
                Ok(())
            }
            Err(BridgeError::UnknownIdentity { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Returns a hook for the host engine to run when an object is
    /// finalized.
    ///
    /// A hook firing after the context was torn down is a no-op.
    pub fn finalization_hook(&self) -> impl FnOnce(HostIdentity) + 'static {
        let coordinator = self.clone();
        move |identity| {
            if let Err(err) = coordinator.host_finalized(identity) {
                log::debug!("finalization of {} ignored: {}", identity, err);
            }
        }
    }

    /// Reports every rooted entry whose age is at least `max_age`.
    pub fn detect_leaks(&self, max_age: Duration) -> BridgeResult<LeakReport> {
        let now = Instant::now();
        let warnings = self
            .table
            .entries()?
            .into_iter()
            .filter(|entry| entry.is_root)
            .filter_map(|entry| {
                let age = now.saturating_duration_since(entry.created_at);
                (age >= max_age).then(|| LeakWarning {
                    identity: entry.identity,
                    kind: entry.handle.kind(),
                    age,
                })
            })
            .collect::<Vec<_>>();
        for warning in &warnings {
            log::warn!(
                "{}: {} rooted for {:?} ({})",
                self.context(),
                warning.identity,
                warning.age,
                warning.kind
            );
        }
        Ok(LeakReport::new(self.context(), max_age, warnings))
    }

    /// Table counters.
    pub fn get_stats(&self) -> BridgeResult<BridgeStats> {
        self.table.stats()
    }

    /// Roots `identity` and returns a token that carries its handle to
    /// another thread.
    ///
    /// The entry stays rooted until the token is retired. If the entry was
    /// already rooted, retiring the token leaves the root in place.
    pub fn hand_off(&self, identity: HostIdentity) -> BridgeResult<RootedHandoff> {
        let already_rooted = self.table.set_root(identity, true)?;
        let handle = self
            .table
            .lookup_by_host(identity)?
            .ok_or(BridgeError::UnknownIdentity { identity })?;
        Ok(RootedHandoff {
            table: Arc::clone(&self.table),
            identity,
            handle,
            owns_root: !already_rooted,
            retired: false,
        })
    }
}

/// A persistent handle rooted for transfer to another thread.
///
/// Dropping an unretired token keeps the entry rooted and logs a warning;
/// the entry then shows up in leak scans.
#[derive(Debug)]
#[must_use = "a hand-off keeps its entry rooted until retired"]
pub struct RootedHandoff {
    table: Arc<BridgeTable>,
    identity: HostIdentity,
    handle: PersistentValue,
    owns_root: bool,
    retired: bool,
}

impl RootedHandoff {
    /// Host identity of the rooted entry.
    pub fn identity(&self) -> HostIdentity {
        self.identity
    }

    /// The rooted handle.
    pub fn handle(&self) -> &PersistentValue {
        &self.handle
    }

    /// Releases the root taken by [`RootCoordinator::hand_off`] and returns
    /// the handle.
    pub fn retire(mut self) -> BridgeResult<PersistentValue> {
        self.retired = true;
        if self.owns_root {
            match self.table.set_root(self.identity, false) {
                Ok(_) | Err(BridgeError::UnknownIdentity { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(self.handle.clone())
    }
}

impl Drop for RootedHandoff {
    fn drop(&mut self) {
        if !self.retired && self.table.is_live() {
            log::warn!(
                "{}: hand-off of {} dropped without retire; entry stays rooted",
                self.table.context(),
                self.identity
            );
        }
    }
}
