//! Native-facing layout of the reference database backend.
//!
//! Mirrors the shape of the core's refdb vtable: lookup and iteration
//! slots, the write family, and a block of reflog and locking slots the
//! bridge reserves but does not populate. As with the configuration table,
//! field order is a wire contract and NULL means "not supported".

use std::ffi::{c_char, c_int, c_uint, c_void};
use std::ptr;

use crate::handles::Handle;
use crate::raw::strings::dispose_string;
use crate::types::{ObjectId, OBJECT_ID_SIZE};

/// Layout revision of [`RawRefdbBackend`]. Bumped on any structural change.
pub const REFDB_BACKEND_VERSION: c_uint = 1;

/// `kind` value for a reference holding an object id.
pub const REFERENCE_DIRECT: c_int = 1;
/// `kind` value for a reference holding another reference's name.
pub const REFERENCE_SYMBOLIC: c_int = 2;

/// A raw object id, binary and fixed-width.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawOid {
    pub id: [u8; OBJECT_ID_SIZE],
}

impl RawOid {
    /// the all-zero id, used as filler on symbolic references
    pub fn zero() -> Self {
        Self {
            id: [0; OBJECT_ID_SIZE],
        }
    }

    pub fn to_object_id(self) -> ObjectId {
        ObjectId::from_bytes(self.id)
    }
}

impl From<&ObjectId> for RawOid {
    fn from(id: &ObjectId) -> Self {
        Self { id: *id.as_bytes() }
    }
}

/// One reference as handed across the boundary.
///
/// Allocated by the bridge for `lookup`, `rename` and iterator `next`;
/// the caller releases it through [`reference_dispose`]. For a direct
/// reference `symbolic` is NULL; for a symbolic one `oid` is all zeros.
#[repr(C)]
#[derive(Debug)]
pub struct RawReference {
    pub name: *mut c_char,
    pub kind: c_int,
    pub oid: RawOid,
    pub symbolic: *mut c_char,
}

/// Free a reference allocated by this bridge, including its strings.
///
/// Safe to call with NULL.
///
/// # Safety
/// `reference` must be NULL or a pointer previously handed out by this
/// bridge and not yet disposed.
pub unsafe extern "C" fn reference_dispose(reference: *mut RawReference) {
    if reference.is_null() {
        return;
    }
    let boxed = Box::from_raw(reference);
    dispose_string(boxed.name);
    dispose_string(boxed.symbolic);
}

/// Author of a reference update, as passed by the core.
///
/// Borrowed for the duration of the call; the bridge copies what it needs.
#[repr(C)]
#[derive(Debug)]
pub struct RawSignature {
    pub name: *const c_char,
    pub email: *const c_char,
    /// seconds since the Unix epoch
    pub when_epoch: i64,
    /// timezone offset in minutes from UTC
    pub when_offset: c_int,
}

/// Write 1 or 0 to `out_exists` depending on whether `name` resolves.
pub type RefdbExistsFn = unsafe extern "C" fn(
    out_exists: *mut c_int,
    backend: *mut RawRefdbBackend,
    name: *const c_char,
) -> c_int;

/// Look up `name`, writing a bridge-allocated reference to `out_ref`.
pub type RefdbLookupFn = unsafe extern "C" fn(
    out_ref: *mut *mut RawReference,
    backend: *mut RawRefdbBackend,
    name: *const c_char,
) -> c_int;

/// Allocate a reference iterator. `glob` may be NULL to iterate everything.
pub type RefdbIteratorFn = unsafe extern "C" fn(
    out_iter: *mut *mut RawReferenceIterator,
    backend: *mut RawRefdbBackend,
    glob: *const c_char,
) -> c_int;

/// Create or update the reference in `reference`.
///
/// `old_id` and `old_target`, when non-NULL, assert the expected prior
/// state; a mismatch fails the write. `force` permits overwriting an
/// existing reference of either kind.
pub type RefdbWriteFn = unsafe extern "C" fn(
    backend: *mut RawRefdbBackend,
    reference: *const RawReference,
    force: c_int,
    who: *const RawSignature,
    message: *const c_char,
    old_id: *const RawOid,
    old_target: *const c_char,
) -> c_int;

/// Rename `old_name` to `new_name`, writing the renamed reference to
/// `out_ref`.
pub type RefdbRenameFn = unsafe extern "C" fn(
    out_ref: *mut *mut RawReference,
    backend: *mut RawRefdbBackend,
    old_name: *const c_char,
    new_name: *const c_char,
    force: c_int,
    who: *const RawSignature,
    message: *const c_char,
) -> c_int;

/// Delete `name`. `old_id` and `old_target` assert prior state as in write.
pub type RefdbDelFn = unsafe extern "C" fn(
    backend: *mut RawRefdbBackend,
    name: *const c_char,
    old_id: *const RawOid,
    old_target: *const c_char,
) -> c_int;

/// Optimize backend storage.
pub type RefdbCompressFn = unsafe extern "C" fn(backend: *mut RawRefdbBackend) -> c_int;

/// Release the backend table and the Rust instance behind it.
pub type RefdbFreeFn = unsafe extern "C" fn(backend: *mut RawRefdbBackend);

/// Reflog query slot. Reserved; the bridge never populates it.
pub type RefdbHasLogFn =
    unsafe extern "C" fn(backend: *mut RawRefdbBackend, name: *const c_char) -> c_int;

/// Reflog creation slot. Reserved; the bridge never populates it.
pub type RefdbEnsureLogFn =
    unsafe extern "C" fn(backend: *mut RawRefdbBackend, name: *const c_char) -> c_int;

/// Reflog read slot. Reserved; the bridge never populates it.
pub type RefdbReflogReadFn = unsafe extern "C" fn(
    out_reflog: *mut *mut c_void,
    backend: *mut RawRefdbBackend,
    name: *const c_char,
) -> c_int;

/// Reflog write slot. Reserved; the bridge never populates it.
pub type RefdbReflogWriteFn =
    unsafe extern "C" fn(backend: *mut RawRefdbBackend, reflog: *mut c_void) -> c_int;

/// Reflog rename slot. Reserved; the bridge never populates it.
pub type RefdbReflogRenameFn = unsafe extern "C" fn(
    backend: *mut RawRefdbBackend,
    old_name: *const c_char,
    new_name: *const c_char,
) -> c_int;

/// Reflog delete slot. Reserved; the bridge never populates it.
pub type RefdbReflogDeleteFn =
    unsafe extern "C" fn(backend: *mut RawRefdbBackend, name: *const c_char) -> c_int;

/// Transactional lock slot. Reserved; the bridge never populates it.
pub type RefdbLockFn = unsafe extern "C" fn(
    out_payload: *mut *mut c_void,
    backend: *mut RawRefdbBackend,
    name: *const c_char,
) -> c_int;

/// Transactional unlock slot. Reserved; the bridge never populates it.
pub type RefdbUnlockFn = unsafe extern "C" fn(
    backend: *mut RawRefdbBackend,
    payload: *mut c_void,
    success: c_int,
    update_reflog: c_int,
    reference: *const RawReference,
    who: *const RawSignature,
    message: *const c_char,
) -> c_int;

/// Advance the iterator, writing a bridge-allocated reference to `out_ref`.
pub type RefdbNextFn = unsafe extern "C" fn(
    out_ref: *mut *mut RawReference,
    iterator: *mut RawReferenceIterator,
) -> c_int;

/// Advance the iterator, writing only the reference name to `out_name`.
///
/// The returned string stays valid until the next call on the iterator or
/// the iterator's release, whichever comes first.
pub type RefdbNextNameFn = unsafe extern "C" fn(
    out_name: *mut *const c_char,
    iterator: *mut RawReferenceIterator,
) -> c_int;

/// Release the iterator table and its Rust iterator state.
pub type RefdbIterFreeFn = unsafe extern "C" fn(iterator: *mut RawReferenceIterator);

/// Operation table for a reference database backend.
///
/// The reflog and lock slots exist so the layout matches the full native
/// vtable; this bridge leaves them NULL and the core falls back to its
/// own reflog handling.
#[repr(C)]
pub struct RawRefdbBackend {
    /// always [`REFDB_BACKEND_VERSION`]
    pub version: c_uint,
    pub exists: Option<RefdbExistsFn>,
    pub lookup: Option<RefdbLookupFn>,
    pub iterator: Option<RefdbIteratorFn>,
    pub write: Option<RefdbWriteFn>,
    pub rename: Option<RefdbRenameFn>,
    pub del: Option<RefdbDelFn>,
    pub compress: Option<RefdbCompressFn>,
    pub has_log: Option<RefdbHasLogFn>,
    pub ensure_log: Option<RefdbEnsureLogFn>,
    /// always populated, even when every other slot is NULL
    pub free: Option<RefdbFreeFn>,
    pub reflog_read: Option<RefdbReflogReadFn>,
    pub reflog_write: Option<RefdbReflogWriteFn>,
    pub reflog_rename: Option<RefdbReflogRenameFn>,
    pub reflog_delete: Option<RefdbReflogDeleteFn>,
    pub lock: Option<RefdbLockFn>,
    pub unlock: Option<RefdbUnlockFn>,
    /// registry token resolving to the Rust backend instance
    pub token: Handle,
}

/// Operation table for a live reference iterator.
#[repr(C)]
pub struct RawReferenceIterator {
    /// owning refdb object, set by the core; never read by the bridge
    pub db: *mut c_void,
    pub next: Option<RefdbNextFn>,
    pub next_name: Option<RefdbNextNameFn>,
    pub free: Option<RefdbIterFreeFn>,
    /// registry token resolving to the Rust iterator state
    pub token: Handle,
    /// backing storage for the last `next_name` result; owned by the
    /// iterator and released with it
    pub name_scratch: *mut c_char,
}

impl RawReferenceIterator {
    /// swap in a new scratch string, freeing the previous one
    pub(crate) unsafe fn replace_scratch(&mut self, fresh: *mut c_char) -> *const c_char {
        let old = std::mem::replace(&mut self.name_scratch, fresh);
        dispose_string(old);
        self.name_scratch as *const c_char
    }
}

impl Default for RawReference {
    fn default() -> Self {
        Self {
            name: ptr::null_mut(),
            kind: 0,
            oid: RawOid::zero(),
            symbolic: ptr::null_mut(),
        }
    }
}
