//! Native resource side table.
//!
//! External host objects carry native resources that have no persistent
//! representation. The converter parks each resource here and stores only an
//! integer handle in a `Cell{External}`. Handles carry a generation so a
//! released slot that gets reused never resolves through an old handle.
//!
//! A slot is owned by the host objects that wrap its resource. When the last
//! owner is finalized the slot is freed, so resources do not outlive every
//! host object that could hand them out.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use host_types::{ExternalResource, HostIdentity, HostObjectRef};

/// Generations stay within 31 bits so packed handles are never negative.
const GENERATION_MASK: u32 = 0x7FFF_FFFF;

fn next_generation(generation: u32) -> u32 {
    generation.wrapping_add(1) & GENERATION_MASK
}

/// Generation-checked handle into a [`NativeResourceTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    index: u32,
    generation: u32,
}

impl ResourceHandle {
    /// Packs the handle into the integer stored in persistent values.
    pub fn to_raw(self) -> i64 {
        (i64::from(self.generation) << 32) | i64::from(self.index)
    }

    /// Unpacks a raw handle. Negative values are never valid.
    pub fn from_raw(raw: i64) -> Option<Self> {
        if raw < 0 {
            return None;
        }
        Some(ResourceHandle {
            index: (raw & 0xFFFF_FFFF) as u32,
            generation: (raw >> 32) as u32,
        })
    }
}

struct Slot {
    generation: u32,
    resource: Option<ExternalResource>,
    owners: HashSet<HostIdentity>,
}

#[derive(Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_address: HashMap<usize, ResourceHandle>,
}

impl Arena {
    fn slot(&self, handle: ResourceHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.resource.is_some())
    }

    fn free_slot(&mut self, handle: ResourceHandle) -> Option<ExternalResource> {
        self.slot(handle)?;
        let slot = &mut self.slots[handle.index as usize];
        let resource = slot.resource.take()?;
        slot.generation = next_generation(slot.generation);
        slot.owners.clear();
        self.free.push(handle.index);
        self.by_address.remove(&address_of(&resource));
        Some(resource)
    }

    fn disown(&mut self, handle: ResourceHandle, owner: HostIdentity) {
        let orphaned = match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation && slot.resource.is_some() => {
                slot.owners.remove(&owner);
                slot.owners.is_empty()
            }
            _ => false,
        };
        if orphaned && self.free_slot(handle).is_some() {
            log::trace!(
                "freed native resource slot {} after {} was finalized",
                handle.index,
                owner
            );
        }
    }
}

fn address_of(resource: &ExternalResource) -> usize {
    Arc::as_ptr(resource) as *const () as usize
}

/// Arena of native resources addressed by [`ResourceHandle`].
#[derive(Default)]
pub struct NativeResourceTable {
    arena: Arc<Mutex<Arena>>,
}

impl NativeResourceTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a resource and returns its handle.
    ///
    /// Inserting a resource that is already stored returns its existing
    /// handle.
    pub fn insert(&self, resource: ExternalResource) -> ResourceHandle {
        let mut arena = self.arena.lock();
        let address = address_of(&resource);
        if let Some(handle) = arena.by_address.get(&address).copied() {
            if arena.slot(handle).is_some() {
                return handle;
            }
        }

        let handle = match arena.free.pop() {
            Some(index) => {
                let slot = &mut arena.slots[index as usize];
                slot.resource = Some(resource);
                slot.owners.clear();
                ResourceHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = arena.slots.len() as u32;
                arena.slots.push(Slot {
                    generation: 0,
                    resource: Some(resource),
                    owners: HashSet::new(),
                });
                ResourceHandle {
                    index,
                    generation: 0,
                }
            }
        };
        arena.by_address.insert(address, handle);
        handle
    }

    /// Stores a resource on behalf of the host object wrapping it.
    ///
    /// The slot stays live until every owning object has been finalized or the
    /// handle is released explicitly.
    pub fn insert_owned(&self, resource: ExternalResource, owner: &HostObjectRef) -> ResourceHandle {
        let handle = self.insert(resource);
        self.adopt(handle, owner);
        handle
    }

    /// Adds `owner` to the owners of a live handle.
    ///
    /// Returns false for stale handles and for objects that already own the
    /// slot; only the first adoption installs a finalization hook.
    pub fn adopt(&self, handle: ResourceHandle, owner: &HostObjectRef) -> bool {
        let mut arena = self.arena.lock();
        let adopted = match arena.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation && slot.resource.is_some() => {
                slot.owners.insert(owner.identity())
            }
            _ => false,
        };
        drop(arena);
        if adopted {
            let arena: Weak<Mutex<Arena>> = Arc::downgrade(&self.arena);
            owner.on_finalize(move |identity| {
                if let Some(arena) = arena.upgrade() {
                    arena.lock().disown(handle, identity);
                }
            });
        }
        adopted
    }

    /// Number of host objects owning a live handle.
    pub fn owner_count(&self, handle: ResourceHandle) -> usize {
        let arena = self.arena.lock();
        arena.slot(handle).map_or(0, |slot| slot.owners.len())
    }

    /// Returns the resource behind a live handle.
    pub fn get(&self, handle: ResourceHandle) -> Option<ExternalResource> {
        let arena = self.arena.lock();
        arena.slot(handle).and_then(|slot| slot.resource.clone())
    }

    /// Frees a handle, returning its resource. Later lookups through the same
    /// handle fail.
    pub fn release(&self, handle: ResourceHandle) -> Option<ExternalResource> {
        let resource = self.arena.lock().free_slot(handle)?;
        log::trace!("released native resource slot {}", handle.index);
        Some(resource)
    }

    /// Number of live resources.
    pub fn len(&self) -> usize {
        let arena = self.arena.lock();
        arena.slots.len() - arena.free.len()
    }

    /// Returns true when no resource is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every resource.
    pub fn clear(&self) -> usize {
        let mut arena = self.arena.lock();
        let mut released = 0;
        let Arena {
            slots,
            free,
            by_address,
        } = &mut *arena;
        for (index, slot) in slots.iter_mut().enumerate() {
            slot.owners.clear();
            if slot.resource.take().is_some() {
                slot.generation = next_generation(slot.generation);
                free.push(index as u32);
                released += 1;
            }
        }
        by_address.clear();
        released
    }
}
