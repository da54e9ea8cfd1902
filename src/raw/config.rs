//! Native-facing layout of the configuration backend.
//!
//! [`RawConfigBackend`] is the operation table handed to the core: a version
//! stamp, a flat block of function pointers, and a trailing token that the
//! dispatch layer resolves back to the Rust backend instance. Capability
//! gating happens at export time. A slot the backend did not opt into is
//! NULL, and the core treats NULL as "operation not supported".
//!
//! Field order and representation are a wire contract. Reordering fields or
//! changing their types breaks every embedder compiled against version 1.

use std::ffi::{c_char, c_int, c_uint, c_void};

use crate::handles::Handle;
use crate::raw::entry::RawConfigEntry;

/// Layout revision of [`RawConfigBackend`]. Bumped on any structural change.
pub const CONFIG_BACKEND_VERSION: c_uint = 1;

/// Reload backing data for the given configuration level.
pub type ConfigOpenFn =
    unsafe extern "C" fn(backend: *mut RawConfigBackend, level: c_uint) -> c_int;

/// Look up the entry for `key`, writing it to `out_entry` on success.
pub type ConfigGetFn = unsafe extern "C" fn(
    backend: *mut RawConfigBackend,
    key: *const c_char,
    out_entry: *mut RawConfigEntry,
) -> c_int;

/// Store `value` under `key`, replacing any previous value.
pub type ConfigSetFn = unsafe extern "C" fn(
    backend: *mut RawConfigBackend,
    key: *const c_char,
    value: *const c_char,
) -> c_int;

/// Update every value matching `pattern` under multi-valued `name`.
pub type ConfigSetMultivarFn = unsafe extern "C" fn(
    backend: *mut RawConfigBackend,
    name: *const c_char,
    pattern: *const c_char,
    value: *const c_char,
) -> c_int;

/// Remove the entry for `key`.
pub type ConfigDelFn =
    unsafe extern "C" fn(backend: *mut RawConfigBackend, key: *const c_char) -> c_int;

/// Remove the values matching `pattern` under multi-valued `name`.
pub type ConfigDelMultivarFn = unsafe extern "C" fn(
    backend: *mut RawConfigBackend,
    name: *const c_char,
    pattern: *const c_char,
) -> c_int;

/// Allocate an entry iterator over the backend, writing it to `out_iter`.
pub type ConfigIteratorFn = unsafe extern "C" fn(
    out_iter: *mut *mut RawConfigIterator,
    backend: *mut RawConfigBackend,
) -> c_int;

/// Capture a read-only snapshot of current state as a new backend table.
pub type ConfigSnapshotFn = unsafe extern "C" fn(
    out_snapshot: *mut *mut RawConfigBackend,
    backend: *mut RawConfigBackend,
) -> c_int;

/// Begin buffering writes until unlock.
pub type ConfigLockFn = unsafe extern "C" fn(backend: *mut RawConfigBackend) -> c_int;

/// End a lock. `out_success` receives 1 to commit buffered writes, 0 when
/// there was nothing to commit.
pub type ConfigUnlockFn =
    unsafe extern "C" fn(backend: *mut RawConfigBackend, out_success: *mut c_int) -> c_int;

/// Release the backend table and the Rust instance behind it.
pub type ConfigFreeFn = unsafe extern "C" fn(backend: *mut RawConfigBackend);

/// Advance the iterator, writing the next entry to `out_entry`.
pub type ConfigNextFn = unsafe extern "C" fn(
    out_entry: *mut RawConfigEntry,
    iterator: *mut RawConfigIterator,
) -> c_int;

/// Release the iterator table and its Rust iterator state.
pub type ConfigIterFreeFn = unsafe extern "C" fn(iterator: *mut RawConfigIterator);

/// Operation table for a configuration backend.
///
/// Allocated by [`export_backend`](crate::config::export_backend) and owned
/// by the handle registry entry named in `token`. The native core calls
/// through the slots and eventually `free`, which tears down the table and
/// the backend together.
#[repr(C)]
pub struct RawConfigBackend {
    /// always [`CONFIG_BACKEND_VERSION`]
    pub version: c_uint,
    /// non-zero when the table is a snapshot and rejects writes
    pub readonly: c_int,
    /// owning configuration object, set by the core; never read by the bridge
    pub cfg: *mut c_void,
    pub open: Option<ConfigOpenFn>,
    pub get: Option<ConfigGetFn>,
    pub set: Option<ConfigSetFn>,
    pub set_multivar: Option<ConfigSetMultivarFn>,
    pub del: Option<ConfigDelFn>,
    pub del_multivar: Option<ConfigDelMultivarFn>,
    pub iterator: Option<ConfigIteratorFn>,
    pub snapshot: Option<ConfigSnapshotFn>,
    pub lock: Option<ConfigLockFn>,
    pub unlock: Option<ConfigUnlockFn>,
    /// always populated, even when every other slot is NULL
    pub free: Option<ConfigFreeFn>,
    /// registry token resolving to the Rust backend instance
    pub token: Handle,
}

/// Operation table for a live configuration iterator.
///
/// Created by the backend's `iterator` slot, released through `free`.
#[repr(C)]
pub struct RawConfigIterator {
    /// the backend this iterator was opened on, set by the bridge
    pub backend: *mut RawConfigBackend,
    /// reserved for the core's use; the bridge leaves it zeroed
    pub flags: c_uint,
    pub next: Option<ConfigNextFn>,
    pub free: Option<ConfigIterFreeFn>,
    /// registry token resolving to the Rust iterator state
    pub token: Handle,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn test_version_constant_is_one() {
        assert_eq!(CONFIG_BACKEND_VERSION, 1);
    }

    #[test]
    fn test_backend_table_starts_with_version_field() {
        // the core reads `version` before trusting anything else in the
        // table, so it must sit at offset zero
        assert_eq!(mem::offset_of!(RawConfigBackend, version), 0);
    }

    #[test]
    fn test_function_pointer_slots_are_nullable_without_padding() {
        // Option<fn> must collapse to a plain nullable pointer for the
        // layout to match the native declaration
        assert_eq!(
            mem::size_of::<Option<ConfigGetFn>>(),
            mem::size_of::<*const c_void>()
        );
    }
}
