//! Generational slot registry binding opaque tokens to live instances.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::raw::config::{RawConfigBackend, RawConfigIterator};
use crate::raw::refdb::{RawRefdbBackend, RawReferenceIterator};
use crate::raw::strings::dispose_string;

/// An opaque token binding one native-visible table to one registered
/// instance.
///
/// Internally a slot index and a generation counter packed into 64 bits.
/// The generation is bumped every time a slot is released, so a token that
/// outlives its instance stops resolving instead of resolving to whatever
/// reused the slot. Raw value zero never names a live instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Handle(u64);

impl Handle {
    fn pack(index: u32, generation: u32) -> Self {
        Self((u64::from(generation) << 32) | u64::from(index))
    }

    fn index(self) -> u32 {
        self.0 as u32
    }

    fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// the raw 64-bit value stored in operation tables
    pub fn as_raw(self) -> u64 {
        self.0
    }

    /// reconstruct a Handle from its raw value
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Owner of a heap-allocated native-visible table.
///
/// The pointer is handed to native code; this enum keeps the allocation
/// alive inside the registry entry so it is freed exactly once, on release.
pub enum NativeTable {
    Config(*mut RawConfigBackend),
    ConfigIterator(*mut RawConfigIterator),
    Refdb(*mut RawRefdbBackend),
    ReferenceIterator(*mut RawReferenceIterator),
}

// The pointed-to tables are uniquely owned by the registry entry holding
// this value; nothing else frees them.
unsafe impl Send for NativeTable {}

impl Drop for NativeTable {
    fn drop(&mut self) {
        unsafe {
            match *self {
                NativeTable::Config(table) => drop(Box::from_raw(table)),
                NativeTable::ConfigIterator(table) => drop(Box::from_raw(table)),
                NativeTable::Refdb(table) => drop(Box::from_raw(table)),
                NativeTable::ReferenceIterator(table) => {
                    // the iterator table owns the last name handed out
                    // through next_name
                    dispose_string((*table).name_scratch);
                    drop(Box::from_raw(table));
                }
            }
        }
    }
}

struct Entry {
    instance: Arc<dyn Any + Send + Sync>,
    table: Option<NativeTable>,
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

struct RegistryInner {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

/// Registry of live backend and iterator instances, keyed by [`Handle`].
///
/// Safe for concurrent acquire/resolve/release; the native core may drive
/// different instances from different threads.
pub struct HandleRegistry {
    inner: Mutex<RegistryInner>,
}

static GLOBAL: HandleRegistry = HandleRegistry::new();

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleRegistry {
    /// create an empty registry
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                slots: Vec::new(),
                free: Vec::new(),
            }),
        }
    }

    /// the process-wide registry used by the dispatch layer
    pub fn global() -> &'static HandleRegistry {
        &GLOBAL
    }

    /// Register an instance and return the token that names it.
    ///
    /// The registry holds an owning reference until [`release`](Self::release).
    pub fn acquire(&self, instance: Arc<dyn Any + Send + Sync>) -> Handle {
        let mut inner = self.inner.lock();

        let index = match inner.free.pop() {
            Some(index) => index,
            None => {
                // generation zero is reserved so the raw value 0 stays invalid
                inner.slots.push(Slot {
                    generation: 1,
                    entry: None,
                });
                (inner.slots.len() - 1) as u32
            }
        };

        let slot = &mut inner.slots[index as usize];
        slot.entry = Some(Entry {
            instance,
            table: None,
        });

        Handle::pack(index, slot.generation)
    }

    /// Attach the native table allocation owned by this entry.
    ///
    /// Returns false (and frees the table) if the token is stale.
    pub fn bind_table(&self, handle: Handle, table: NativeTable) -> bool {
        let mut inner = self.inner.lock();

        match inner.slots.get_mut(handle.index() as usize) {
            Some(slot) if slot.generation == handle.generation() => match slot.entry.as_mut() {
                Some(entry) => {
                    entry.table = Some(table);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Recover the instance a token names, without transferring ownership.
    ///
    /// Returns `None` for released or never-issued tokens.
    pub fn resolve(&self, handle: Handle) -> Option<Arc<dyn Any + Send + Sync>> {
        let inner = self.inner.lock();

        let slot = inner.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }

        slot.entry.as_ref().map(|entry| Arc::clone(&entry.instance))
    }

    /// Drop the owning reference and the table allocation for a token.
    ///
    /// Idempotent: releasing an already-released token returns false and
    /// does nothing. Returns true when this call performed the release.
    pub fn release(&self, handle: Handle) -> bool {
        let entry = {
            let mut inner = self.inner.lock();

            let Some(slot) = inner.slots.get_mut(handle.index() as usize) else {
                return false;
            };
            if slot.generation != handle.generation() || slot.entry.is_none() {
                return false;
            }

            slot.generation = slot.generation.wrapping_add(1);
            if slot.generation == 0 {
                slot.generation = 1;
            }

            let entry = slot.entry.take();
            inner.free.push(handle.index());
            entry
        };

        // Instance teardown may call back into the registry; drop outside
        // the lock.
        drop(entry);
        true
    }
}
