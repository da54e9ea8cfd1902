//! dispatch layer between the native refdb table and a [`RefdbBackend`].
//!
//! Same construction as the configuration side: [`export_backend`]
//! registers the instance, builds the `#[repr(C)]` table with
//! monomorphized trampolines in the capability-gated slots, and the
//! registry keeps everything alive until the `free` slot runs. The
//! iterator trampolines route through the resolution engine, so broken
//! symbolic references never reach native code.

use std::ffi::{c_char, c_int};
use std::ptr;
use std::sync::Arc;

use chrono::DateTime;
use parking_lot::Mutex;

use crate::errors::BackendError;
use crate::handles::{HandleRegistry, NativeTable};
use crate::raw::boundary::{boundary_error, run_guarded, run_release};
use crate::raw::codes;
use crate::raw::last_error::ErrorCategory;
use crate::raw::refdb::{
    RawOid, RawRefdbBackend, RawReference, RawReferenceIterator, RawSignature, RefdbCompressFn,
    RefdbDelFn, RefdbExistsFn, RefdbIterFreeFn, RefdbIteratorFn, RefdbLookupFn, RefdbNextFn,
    RefdbNextNameFn, RefdbRenameFn, RefdbWriteFn, REFDB_BACKEND_VERSION, REFERENCE_DIRECT,
    REFERENCE_SYMBOLIC,
};
use crate::raw::strings::{dispose_string, export_string, import_opt_str, import_str};
use crate::types::{RefName, Signature};

use super::backend::{RefTarget, Reference, RefdbBackend, RefdbOps};
use super::iterator::{next_existing, next_existing_name};

/// Export a backend as a native-visible refdb operation table.
///
/// Consumes the backend; the registry keeps it alive until the native
/// core calls the table's `free` slot. The reserved reflog and lock slots
/// stay NULL — the core falls back to its own handling for those.
pub fn export_backend<B: RefdbBackend>(backend: B) -> *mut RawRefdbBackend {
    let ops = backend.supported_operations();
    let registry = HandleRegistry::global();
    let token = registry.acquire(Arc::new(Mutex::new(backend)));

    let table = Box::into_raw(Box::new(RawRefdbBackend {
        version: REFDB_BACKEND_VERSION,
        exists: ops
            .contains(RefdbOps::EXISTS)
            .then_some(exists_dispatch::<B> as RefdbExistsFn),
        lookup: ops
            .contains(RefdbOps::LOOKUP)
            .then_some(lookup_dispatch::<B> as RefdbLookupFn),
        iterator: ops
            .contains(RefdbOps::ITERATOR)
            .then_some(iterator_dispatch::<B> as RefdbIteratorFn),
        write: ops
            .contains(RefdbOps::WRITE)
            .then_some(write_dispatch::<B> as RefdbWriteFn),
        rename: ops
            .contains(RefdbOps::RENAME)
            .then_some(rename_dispatch::<B> as RefdbRenameFn),
        del: ops
            .contains(RefdbOps::DELETE)
            .then_some(del_dispatch::<B> as RefdbDelFn),
        compress: ops
            .contains(RefdbOps::COMPRESS)
            .then_some(compress_dispatch::<B> as RefdbCompressFn),
        has_log: None,
        ensure_log: None,
        free: Some(free_dispatch),
        reflog_read: None,
        reflog_write: None,
        reflog_rename: None,
        reflog_delete: None,
        lock: None,
        unlock: None,
        token,
    }));
    registry.bind_table(token, NativeTable::Refdb(table));

    tracing::debug!(
        target: "gitbridge.handles",
        token = token.as_raw(),
        ops = ops.bits(),
        "exported refdb backend"
    );

    table
}

/// One live iterator paired with the backend it scans.
///
/// The resolution engine needs both: the cursor for candidates and the
/// backend for target-existence checks. Locked separately; the dispatch
/// layer always takes the backend lock first.
struct RefIterCell<B: RefdbBackend> {
    backend: Arc<Mutex<B>>,
    iter: Mutex<B::Iter>,
}

fn export_iterator<B: RefdbBackend>(
    iter: B::Iter,
    backend: Arc<Mutex<B>>,
) -> *mut RawReferenceIterator {
    let registry = HandleRegistry::global();
    let token = registry.acquire(Arc::new(RefIterCell {
        backend,
        iter: Mutex::new(iter),
    }));

    let table = Box::into_raw(Box::new(RawReferenceIterator {
        db: ptr::null_mut(),
        next: Some(next_dispatch::<B> as RefdbNextFn),
        next_name: Some(next_name_dispatch::<B> as RefdbNextNameFn),
        free: Some(iter_free_dispatch as RefdbIterFreeFn),
        token,
        name_scratch: ptr::null_mut(),
    }));
    registry.bind_table(token, NativeTable::ReferenceIterator(table));

    tracing::trace!(
        target: "gitbridge.handles",
        token = token.as_raw(),
        "exported reference iterator"
    );

    table
}

unsafe fn resolve_backend<B: RefdbBackend>(
    table: *mut RawRefdbBackend,
) -> Result<Arc<Mutex<B>>, BackendError> {
    let cannot = || BackendError::Message("cannot retrieve the refdb backend".into());
    if table.is_null() {
        return Err(cannot());
    }
    HandleRegistry::global()
        .resolve((*table).token)
        .and_then(|instance| instance.downcast::<Mutex<B>>().ok())
        .ok_or_else(cannot)
}

unsafe fn resolve_iter_cell<B: RefdbBackend>(
    table: *mut RawReferenceIterator,
) -> Result<Arc<RefIterCell<B>>, BackendError> {
    let cannot = || BackendError::Message("cannot retrieve the reference iterator".into());
    if table.is_null() {
        return Err(cannot());
    }
    HandleRegistry::global()
        .resolve((*table).token)
        .and_then(|instance| instance.downcast::<RefIterCell<B>>().ok())
        .ok_or_else(cannot)
}

unsafe fn import_ref_name(ptr: *const c_char, what: &str) -> Result<RefName, BackendError> {
    Ok(RefName::new(import_str(ptr, what)?)?)
}

/// Rebuild a [`Reference`] from its native form.
unsafe fn import_reference(raw: *const RawReference) -> Result<Reference, BackendError> {
    if raw.is_null() {
        return Err(BackendError::Message("argument 'reference' is null".into()));
    }
    let name = import_ref_name((*raw).name, "reference name")?;
    match (*raw).kind {
        REFERENCE_DIRECT => Ok(Reference::direct(name, (*raw).oid.to_object_id())),
        REFERENCE_SYMBOLIC => {
            let target = import_ref_name((*raw).symbolic, "symbolic target")?;
            Ok(Reference::symbolic(name, target))
        }
        other => Err(BackendError::Message(format!(
            "unknown reference kind {other}"
        ))),
    }
}

/// Allocate the native form of a [`Reference`].
///
/// On partial failure the already-exported name is reclaimed.
fn export_reference(reference: &Reference) -> Result<*mut RawReference, BackendError> {
    let name = export_string(reference.name.as_str())?;
    let raw = match &reference.target {
        RefTarget::Direct(id) => RawReference {
            name,
            kind: REFERENCE_DIRECT,
            oid: RawOid::from(id),
            symbolic: ptr::null_mut(),
        },
        RefTarget::Symbolic(target) => {
            let symbolic = match export_string(target.as_str()) {
                Ok(symbolic) => symbolic,
                Err(err) => {
                    unsafe { dispose_string(name) };
                    return Err(err);
                }
            };
            RawReference {
                name,
                kind: REFERENCE_SYMBOLIC,
                oid: RawOid::zero(),
                symbolic,
            }
        }
    };
    Ok(Box::into_raw(Box::new(raw)))
}

unsafe fn import_signature(raw: *const RawSignature) -> Result<Option<Signature>, BackendError> {
    if raw.is_null() {
        return Ok(None);
    }
    let name = import_str((*raw).name, "signature name")?;
    let email = import_str((*raw).email, "signature email")?;
    let when = DateTime::from_timestamp((*raw).when_epoch, 0)
        .ok_or_else(|| BackendError::Message("signature timestamp out of range".into()))?;
    Ok(Some(Signature::new(name, email, when)))
}

unsafe fn write_reference_out(
    out_ref: *mut *mut RawReference,
    reference: &Reference,
) -> Result<(), c_int> {
    match export_reference(reference) {
        Ok(raw) => {
            *out_ref = raw;
            Ok(())
        }
        Err(err) => Err(boundary_error(ErrorCategory::Reference, err.to_string())),
    }
}

unsafe extern "C" fn exists_dispatch<B: RefdbBackend>(
    out_exists: *mut c_int,
    backend: *mut RawRefdbBackend,
    name: *const c_char,
) -> c_int {
    let result = run_guarded(ErrorCategory::Reference, || {
        if out_exists.is_null() {
            return Err(BackendError::Message("output pointer is null".into()));
        }
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        let name = unsafe { import_ref_name(name, "name") }?;
        cell.lock().exists(&name)
    });
    match result {
        Ok(found) => {
            unsafe { *out_exists = c_int::from(found) };
            codes::OK
        }
        Err(code) => code,
    }
}

unsafe extern "C" fn lookup_dispatch<B: RefdbBackend>(
    out_ref: *mut *mut RawReference,
    backend: *mut RawRefdbBackend,
    name: *const c_char,
) -> c_int {
    let result = run_guarded(ErrorCategory::Reference, || {
        if out_ref.is_null() {
            return Err(BackendError::Message(
                "output reference pointer is null".into(),
            ));
        }
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        let name = unsafe { import_ref_name(name, "name") }?;
        cell.lock().lookup(&name)
    });
    match result {
        Ok(Some(reference)) => match unsafe { write_reference_out(out_ref, &reference) } {
            Ok(()) => codes::OK,
            Err(code) => code,
        },
        // absent reference: distinguished code, no error message
        Ok(None) => codes::ENOTFOUND,
        Err(code) => code,
    }
}

unsafe extern "C" fn iterator_dispatch<B: RefdbBackend>(
    out_iter: *mut *mut RawReferenceIterator,
    backend: *mut RawRefdbBackend,
    glob: *const c_char,
) -> c_int {
    let result = run_guarded(ErrorCategory::Reference, || {
        if out_iter.is_null() {
            return Err(BackendError::Message(
                "output iterator pointer is null".into(),
            ));
        }
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        let glob = unsafe { import_opt_str(glob, "glob") }?;
        let iter = cell.lock().iterator(glob)?;
        Ok(export_iterator::<B>(iter, Arc::clone(&cell)))
    });
    match result {
        Ok(table) => {
            unsafe { *out_iter = table };
            codes::OK
        }
        Err(code) => code,
    }
}

unsafe extern "C" fn write_dispatch<B: RefdbBackend>(
    backend: *mut RawRefdbBackend,
    reference: *const RawReference,
    force: c_int,
    who: *const RawSignature,
    message: *const c_char,
    old_id: *const RawOid,
    old_target: *const c_char,
) -> c_int {
    let result = run_guarded(ErrorCategory::Reference, || {
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        let reference = unsafe { import_reference(reference) }?;
        let who = unsafe { import_signature(who) }?;
        let message = unsafe { import_opt_str(message, "message") }?;
        let old_id = unsafe { old_id.as_ref() }.map(|raw| raw.to_object_id());
        let old_target = unsafe { import_opt_str(old_target, "old_target") }?
            .map(RefName::new)
            .transpose()?;
        cell.lock().write(
            &reference,
            force != 0,
            who.as_ref(),
            message,
            old_id.as_ref(),
            old_target.as_ref(),
        )
    });
    match result {
        Ok(()) => codes::OK,
        Err(code) => code,
    }
}

unsafe extern "C" fn rename_dispatch<B: RefdbBackend>(
    out_ref: *mut *mut RawReference,
    backend: *mut RawRefdbBackend,
    old_name: *const c_char,
    new_name: *const c_char,
    force: c_int,
    who: *const RawSignature,
    message: *const c_char,
) -> c_int {
    let result = run_guarded(ErrorCategory::Reference, || {
        if out_ref.is_null() {
            return Err(BackendError::Message(
                "output reference pointer is null".into(),
            ));
        }
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        let old_name = unsafe { import_ref_name(old_name, "old name") }?;
        let new_name = unsafe { import_ref_name(new_name, "new name") }?;
        let who = unsafe { import_signature(who) }?;
        let message = unsafe { import_opt_str(message, "message") }?;
        cell.lock()
            .rename(&old_name, &new_name, force != 0, who.as_ref(), message)
    });
    match result {
        Ok(reference) => match unsafe { write_reference_out(out_ref, &reference) } {
            Ok(()) => codes::OK,
            Err(code) => code,
        },
        Err(code) => code,
    }
}

unsafe extern "C" fn del_dispatch<B: RefdbBackend>(
    backend: *mut RawRefdbBackend,
    name: *const c_char,
    old_id: *const RawOid,
    old_target: *const c_char,
) -> c_int {
    let result = run_guarded(ErrorCategory::Reference, || {
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        let name = unsafe { import_ref_name(name, "name") }?;
        let old_id = unsafe { old_id.as_ref() }.map(|raw| raw.to_object_id());
        let old_target = unsafe { import_opt_str(old_target, "old_target") }?
            .map(RefName::new)
            .transpose()?;
        cell.lock()
            .delete(&name, old_id.as_ref(), old_target.as_ref())
    });
    match result {
        Ok(()) => codes::OK,
        Err(code) => code,
    }
}

unsafe extern "C" fn compress_dispatch<B: RefdbBackend>(backend: *mut RawRefdbBackend) -> c_int {
    let result = run_guarded(ErrorCategory::Reference, || {
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        cell.lock().compress()
    });
    match result {
        Ok(()) => codes::OK,
        Err(code) => code,
    }
}

/// Shared by every backend table; never unwinds. A stale token makes this
/// a no-op, so a double free cannot double-drop.
unsafe extern "C" fn free_dispatch(backend: *mut RawRefdbBackend) {
    if backend.is_null() {
        return;
    }
    let token = (*backend).token;
    run_release(ErrorCategory::Reference, || {
        let released = HandleRegistry::global().release(token);
        tracing::debug!(
            target: "gitbridge.handles",
            token = token.as_raw(),
            released,
            "refdb backend free"
        );
    });
}

unsafe extern "C" fn next_dispatch<B: RefdbBackend>(
    out_ref: *mut *mut RawReference,
    iterator: *mut RawReferenceIterator,
) -> c_int {
    let result = run_guarded(ErrorCategory::Reference, || {
        if out_ref.is_null() {
            return Err(BackendError::Message(
                "output reference pointer is null".into(),
            ));
        }
        let cell = unsafe { resolve_iter_cell::<B>(iterator) }?;
        // backend before iterator, the only place both locks are held
        let backend = cell.backend.lock();
        let mut iter = cell.iter.lock();
        next_existing(&*backend, &mut *iter)
    });
    match result {
        Ok(Some(reference)) => match unsafe { write_reference_out(out_ref, &reference) } {
            Ok(()) => codes::OK,
            Err(code) => code,
        },
        // exhausted: distinguished code, no error message, terminal
        Ok(None) => codes::ITEROVER,
        Err(code) => code,
    }
}

unsafe extern "C" fn next_name_dispatch<B: RefdbBackend>(
    out_name: *mut *const c_char,
    iterator: *mut RawReferenceIterator,
) -> c_int {
    let result = run_guarded(ErrorCategory::Reference, || {
        if out_name.is_null() {
            return Err(BackendError::Message("output name pointer is null".into()));
        }
        let cell = unsafe { resolve_iter_cell::<B>(iterator) }?;
        let backend = cell.backend.lock();
        let mut iter = cell.iter.lock();
        match next_existing_name(&*backend, &mut *iter)? {
            Some(name) => {
                // the previous scratch string dies here; swapping under
                // the iterator lock keeps racing callers off freed memory
                let fresh = export_string(name.as_str())?;
                let exposed = unsafe { (*iterator).replace_scratch(fresh) };
                Ok(Some(exposed))
            }
            None => Ok(None),
        }
    });
    match result {
        Ok(Some(exposed)) => {
            unsafe { *out_name = exposed };
            codes::OK
        }
        Ok(None) => codes::ITEROVER,
        Err(code) => code,
    }
}

unsafe extern "C" fn iter_free_dispatch(iterator: *mut RawReferenceIterator) {
    if iterator.is_null() {
        return;
    }
    let token = (*iterator).token;
    run_release(ErrorCategory::Reference, || {
        let released = HandleRegistry::global().release(token);
        tracing::trace!(
            target: "gitbridge.handles",
            token = token.as_raw(),
            released,
            "reference iterator free"
        );
    });
}
