//! dispatch layer between the native config table and a [`ConfigBackend`].
//!
//! [`export_backend`] consumes a backend, registers it, and hands back a
//! heap-allocated operation table the native core can call through. Each
//! slot is a monomorphized trampoline: resolve the table's token back to
//! the instance, marshal inputs, run the adapter behind the panic barrier,
//! marshal outputs into native-owned memory, collapse the outcome to a
//! status code. The registry entry owns both the instance and the table
//! allocation until the core calls the `free` slot.

use std::ffi::{c_int, c_uint};
use std::fmt;
use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::BackendError;
use crate::handles::{HandleRegistry, NativeTable};
use crate::raw::boundary::{boundary_error, run_guarded, run_release};
use crate::raw::codes;
use crate::raw::config::{
    ConfigDelFn, ConfigDelMultivarFn, ConfigGetFn, ConfigIterFreeFn, ConfigIteratorFn,
    ConfigLockFn, ConfigNextFn, ConfigOpenFn, ConfigSetFn, ConfigSetMultivarFn, ConfigSnapshotFn,
    ConfigUnlockFn, RawConfigBackend, RawConfigIterator, CONFIG_BACKEND_VERSION,
};
use crate::raw::entry::RawConfigEntry;
use crate::raw::last_error::ErrorCategory;
use crate::raw::strings::{dispose_string, export_string, import_str};

use super::backend::{ConfigBackend, ConfigEntry, ConfigLevel, ConfigOps};
use super::iterator::ConfigIterator;

/// Export a backend as a native-visible operation table.
///
/// Consumes the backend; the registry keeps it alive until the native core
/// calls the table's `free` slot, which releases the instance and the
/// table allocation together. Calling any slot after `free` fails with the
/// generic error code instead of touching freed state.
pub fn export_backend<B: ConfigBackend>(backend: B) -> *mut RawConfigBackend {
    export_with(backend, false)
}

fn export_with<B: ConfigBackend>(backend: B, readonly: bool) -> *mut RawConfigBackend {
    let ops = backend.supported_operations();
    let registry = HandleRegistry::global();
    let token = registry.acquire(Arc::new(Mutex::new(backend)));

    let table = Box::into_raw(Box::new(RawConfigBackend {
        version: CONFIG_BACKEND_VERSION,
        readonly: c_int::from(readonly),
        cfg: ptr::null_mut(),
        open: ops
            .contains(ConfigOps::OPEN)
            .then_some(open_dispatch::<B> as ConfigOpenFn),
        get: ops
            .contains(ConfigOps::GET)
            .then_some(get_dispatch::<B> as ConfigGetFn),
        set: ops
            .contains(ConfigOps::SET)
            .then_some(set_dispatch::<B> as ConfigSetFn),
        set_multivar: ops
            .contains(ConfigOps::SET_MULTIVAR)
            .then_some(set_multivar_dispatch::<B> as ConfigSetMultivarFn),
        del: ops
            .contains(ConfigOps::DEL)
            .then_some(del_dispatch::<B> as ConfigDelFn),
        del_multivar: ops
            .contains(ConfigOps::DEL_MULTIVAR)
            .then_some(del_multivar_dispatch::<B> as ConfigDelMultivarFn),
        iterator: ops
            .contains(ConfigOps::ITERATOR)
            .then_some(iterator_dispatch::<B> as ConfigIteratorFn),
        snapshot: ops
            .contains(ConfigOps::SNAPSHOT)
            .then_some(snapshot_dispatch::<B> as ConfigSnapshotFn),
        lock: ops
            .contains(ConfigOps::LOCK)
            .then_some(lock_dispatch::<B> as ConfigLockFn),
        unlock: ops
            .contains(ConfigOps::UNLOCK)
            .then_some(unlock_dispatch::<B> as ConfigUnlockFn),
        free: Some(free_dispatch),
        token,
    }));
    registry.bind_table(token, NativeTable::Config(table));

    tracing::debug!(
        target: "gitbridge.handles",
        token = token.as_raw(),
        ops = ops.bits(),
        readonly,
        "exported config backend"
    );

    table
}

fn export_iterator<B: ConfigBackend>(
    iter: B::Iter,
    backend: *mut RawConfigBackend,
) -> *mut RawConfigIterator {
    let registry = HandleRegistry::global();
    let token = registry.acquire(Arc::new(Mutex::new(iter)));

    let table = Box::into_raw(Box::new(RawConfigIterator {
        backend,
        flags: 0,
        next: Some(next_dispatch::<B> as ConfigNextFn),
        free: Some(iter_free_dispatch as ConfigIterFreeFn),
        token,
    }));
    registry.bind_table(token, NativeTable::ConfigIterator(table));

    tracing::trace!(
        target: "gitbridge.handles",
        token = token.as_raw(),
        "exported config iterator"
    );

    table
}

unsafe fn resolve_backend<B: ConfigBackend>(
    table: *mut RawConfigBackend,
) -> Result<Arc<Mutex<B>>, BackendError> {
    let cannot = || BackendError::Message("cannot retrieve the config backend".into());
    if table.is_null() {
        return Err(cannot());
    }
    HandleRegistry::global()
        .resolve((*table).token)
        .and_then(|instance| instance.downcast::<Mutex<B>>().ok())
        .ok_or_else(cannot)
}

unsafe fn resolve_iterator<B: ConfigBackend>(
    table: *mut RawConfigIterator,
) -> Result<Arc<Mutex<B::Iter>>, BackendError> {
    let cannot = || BackendError::Message("cannot retrieve the config iterator".into());
    if table.is_null() {
        return Err(cannot());
    }
    HandleRegistry::global()
        .resolve((*table).token)
        .and_then(|instance| instance.downcast::<Mutex<B::Iter>>().ok())
        .ok_or_else(cannot)
}

/// Fill a caller-provided entry record with native-owned strings.
///
/// On partial failure the already-exported string is reclaimed, so a
/// failing call leaks nothing and leaves the record untouched.
unsafe fn write_entry<V: fmt::Display>(
    out: *mut RawConfigEntry,
    entry: &ConfigEntry<V>,
) -> Result<(), c_int> {
    if out.is_null() {
        return Err(boundary_error(
            ErrorCategory::Config,
            "output entry pointer is null",
        ));
    }

    let name = match export_string(&entry.name) {
        Ok(name) => name,
        Err(err) => return Err(boundary_error(ErrorCategory::Config, err.to_string())),
    };
    let rendered = entry.value.to_string();
    let value = match export_string(&rendered) {
        Ok(value) => value,
        Err(err) => {
            dispose_string(name);
            return Err(boundary_error(ErrorCategory::Config, err.to_string()));
        }
    };

    (*out).name = name;
    (*out).value = value;
    (*out).level = entry.level.as_raw();
    Ok(())
}

unsafe extern "C" fn open_dispatch<B: ConfigBackend>(
    backend: *mut RawConfigBackend,
    level: c_uint,
) -> c_int {
    let result = run_guarded(ErrorCategory::Config, || {
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        let level = ConfigLevel::from_raw(level)
            .ok_or_else(|| BackendError::Message(format!("unknown configuration level {level}")))?;
        cell.lock().open(level)
    });
    match result {
        Ok(()) => codes::OK,
        Err(code) => code,
    }
}

unsafe extern "C" fn get_dispatch<B: ConfigBackend>(
    backend: *mut RawConfigBackend,
    key: *const std::ffi::c_char,
    out_entry: *mut RawConfigEntry,
) -> c_int {
    let result = run_guarded(ErrorCategory::Config, || {
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        let key = unsafe { import_str(key, "key") }?;
        cell.lock().get(key)
    });
    match result {
        Ok(Some(entry)) => match unsafe { write_entry(out_entry, &entry) } {
            Ok(()) => codes::OK,
            Err(code) => code,
        },
        // absent key: distinguished code, no error message
        Ok(None) => codes::ENOTFOUND,
        Err(code) => code,
    }
}

unsafe extern "C" fn set_dispatch<B: ConfigBackend>(
    backend: *mut RawConfigBackend,
    key: *const std::ffi::c_char,
    value: *const std::ffi::c_char,
) -> c_int {
    let result = run_guarded(ErrorCategory::Config, || {
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        let key = unsafe { import_str(key, "key") }?;
        let value = unsafe { import_str(value, "value") }?;
        cell.lock().set(key, value)
    });
    match result {
        Ok(()) => codes::OK,
        Err(code) => code,
    }
}

unsafe extern "C" fn set_multivar_dispatch<B: ConfigBackend>(
    backend: *mut RawConfigBackend,
    name: *const std::ffi::c_char,
    pattern: *const std::ffi::c_char,
    value: *const std::ffi::c_char,
) -> c_int {
    let result = run_guarded(ErrorCategory::Config, || {
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        let name = unsafe { import_str(name, "name") }?;
        let pattern = unsafe { import_str(pattern, "pattern") }?;
        let value = unsafe { import_str(value, "value") }?;
        cell.lock().set_multivar(name, pattern, value)
    });
    match result {
        Ok(()) => codes::OK,
        Err(code) => code,
    }
}

unsafe extern "C" fn del_dispatch<B: ConfigBackend>(
    backend: *mut RawConfigBackend,
    key: *const std::ffi::c_char,
) -> c_int {
    let result = run_guarded(ErrorCategory::Config, || {
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        let key = unsafe { import_str(key, "key") }?;
        cell.lock().del(key)
    });
    match result {
        Ok(()) => codes::OK,
        Err(code) => code,
    }
}

unsafe extern "C" fn del_multivar_dispatch<B: ConfigBackend>(
    backend: *mut RawConfigBackend,
    name: *const std::ffi::c_char,
    pattern: *const std::ffi::c_char,
) -> c_int {
    let result = run_guarded(ErrorCategory::Config, || {
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        let name = unsafe { import_str(name, "name") }?;
        let pattern = unsafe { import_str(pattern, "pattern") }?;
        cell.lock().del_multivar(name, pattern)
    });
    match result {
        Ok(()) => codes::OK,
        Err(code) => code,
    }
}

unsafe extern "C" fn iterator_dispatch<B: ConfigBackend>(
    out_iter: *mut *mut RawConfigIterator,
    backend: *mut RawConfigBackend,
) -> c_int {
    let result = run_guarded(ErrorCategory::Config, || {
        if out_iter.is_null() {
            return Err(BackendError::Message(
                "output iterator pointer is null".into(),
            ));
        }
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        let iter = cell.lock().iterator()?;
        Ok(export_iterator::<B>(iter, backend))
    });
    match result {
        Ok(table) => {
            unsafe { *out_iter = table };
            codes::OK
        }
        Err(code) => code,
    }
}

unsafe extern "C" fn snapshot_dispatch<B: ConfigBackend>(
    out_snapshot: *mut *mut RawConfigBackend,
    backend: *mut RawConfigBackend,
) -> c_int {
    let result = run_guarded(ErrorCategory::Config, || {
        if out_snapshot.is_null() {
            return Err(BackendError::Message(
                "output snapshot pointer is null".into(),
            ));
        }
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        let frozen = cell.lock().snapshot()?;
        Ok(export_with(frozen, true))
    });
    match result {
        Ok(table) => {
            unsafe { *out_snapshot = table };
            codes::OK
        }
        Err(code) => code,
    }
}

unsafe extern "C" fn lock_dispatch<B: ConfigBackend>(backend: *mut RawConfigBackend) -> c_int {
    let result = run_guarded(ErrorCategory::Config, || {
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        cell.lock().lock()
    });
    match result {
        Ok(()) => codes::OK,
        Err(code) => code,
    }
}

unsafe extern "C" fn unlock_dispatch<B: ConfigBackend>(
    backend: *mut RawConfigBackend,
    out_success: *mut c_int,
) -> c_int {
    let result = run_guarded(ErrorCategory::Config, || {
        let cell = unsafe { resolve_backend::<B>(backend) }?;
        cell.lock().unlock()
    });
    match result {
        Ok(committed) => {
            if !out_success.is_null() {
                unsafe { *out_success = c_int::from(committed) };
            }
            codes::OK
        }
        Err(code) => code,
    }
}

/// Shared by every backend table; never unwinds. A stale token makes this
/// a no-op, so a double free cannot double-drop.
unsafe extern "C" fn free_dispatch(backend: *mut RawConfigBackend) {
    if backend.is_null() {
        return;
    }
    let token = (*backend).token;
    run_release(ErrorCategory::Config, || {
        let released = HandleRegistry::global().release(token);
        tracing::debug!(
            target: "gitbridge.handles",
            token = token.as_raw(),
            released,
            "config backend free"
        );
    });
}

unsafe extern "C" fn next_dispatch<B: ConfigBackend>(
    out_entry: *mut RawConfigEntry,
    iterator: *mut RawConfigIterator,
) -> c_int {
    let result = run_guarded(ErrorCategory::Config, || {
        let cell = unsafe { resolve_iterator::<B>(iterator) }?;
        let next = cell.lock().next()?;
        Ok(next)
    });
    match result {
        Ok(Some(entry)) => match unsafe { write_entry(out_entry, &entry) } {
            Ok(()) => codes::OK,
            Err(code) => code,
        },
        // exhausted: distinguished code, no error message, terminal
        Ok(None) => codes::ITEROVER,
        Err(code) => code,
    }
}

unsafe extern "C" fn iter_free_dispatch(iterator: *mut RawConfigIterator) {
    if iterator.is_null() {
        return;
    }
    let token = (*iterator).token;
    run_release(ErrorCategory::Config, || {
        let released = HandleRegistry::global().release(token);
        tracing::trace!(
            target: "gitbridge.handles",
            token = token.as_raw(),
            released,
            "config iterator free"
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigBackend;
    use crate::raw::entry::config_entry_dispose;
    use crate::raw::last_error::{clear_last_error, last_error, test_serial};
    use std::ffi::{CStr, CString};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn setup() -> *mut RawConfigBackend {
        export_backend(MemoryConfigBackend::with_entries(
            ConfigLevel::Local,
            [("core.bare", "true")],
        ))
    }

    unsafe fn call_free(table: *mut RawConfigBackend) {
        ((*table).free.unwrap())(table);
    }

    unsafe fn call_set(table: *mut RawConfigBackend, key: &str, value: &str) -> c_int {
        let key = CString::new(key).unwrap();
        let value = CString::new(value).unwrap();
        ((*table).set.unwrap())(table, key.as_ptr(), value.as_ptr())
    }

    unsafe fn call_get(
        table: *mut RawConfigBackend,
        key: &str,
    ) -> Result<(String, String, u32), c_int> {
        let key = CString::new(key).unwrap();
        let mut entry = RawConfigEntry::zeroed();
        let code = ((*table).get.unwrap())(table, key.as_ptr(), &mut entry);
        if code != codes::OK {
            return Err(code);
        }
        let name = CStr::from_ptr(entry.name).to_str().unwrap().to_string();
        let value = CStr::from_ptr(entry.value).to_str().unwrap().to_string();
        let level = entry.level;
        config_entry_dispose(&mut entry);
        Ok((name, value, level))
    }

    struct GetOnlyBackend;

    impl ConfigBackend for GetOnlyBackend {
        type Value = String;
        type Iter = crate::config::MemoryConfigIterator;

        fn supported_operations(&self) -> ConfigOps {
            ConfigOps::GET | ConfigOps::FREE
        }

        fn get(&self, key: &str) -> crate::errors::BackendResult<Option<ConfigEntry<String>>> {
            Ok(Some(ConfigEntry::new(
                key,
                "fixed".to_string(),
                ConfigLevel::Local,
            )))
        }
    }

    struct PanickingBackend;

    impl ConfigBackend for PanickingBackend {
        type Value = String;
        type Iter = crate::config::MemoryConfigIterator;

        fn supported_operations(&self) -> ConfigOps {
            ConfigOps::GET | ConfigOps::FREE
        }

        fn get(&self, _key: &str) -> crate::errors::BackendResult<Option<ConfigEntry<String>>> {
            panic!("config backend exploded")
        }
    }

    struct DropFlagBackend {
        dropped: Arc<AtomicBool>,
    }

    impl Drop for DropFlagBackend {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    impl ConfigBackend for DropFlagBackend {
        type Value = String;
        type Iter = crate::config::MemoryConfigIterator;

        fn supported_operations(&self) -> ConfigOps {
            ConfigOps::FREE
        }
    }

    #[test]
    fn test_capability_gating_controls_slot_population() {
        let table = export_backend(GetOnlyBackend);
        unsafe {
            assert!((*table).get.is_some());
            assert!((*table).free.is_some());
            assert!((*table).open.is_none());
            assert!((*table).set.is_none());
            assert!((*table).set_multivar.is_none());
            assert!((*table).del.is_none());
            assert!((*table).del_multivar.is_none());
            assert!((*table).iterator.is_none());
            assert!((*table).snapshot.is_none());
            assert!((*table).lock.is_none());
            assert!((*table).unlock.is_none());
            assert_eq!((*table).version, CONFIG_BACKEND_VERSION);
            call_free(table);
        }
    }

    #[test]
    fn test_full_backend_populates_every_slot() {
        let table = setup();
        unsafe {
            assert!((*table).open.is_some());
            assert!((*table).get.is_some());
            assert!((*table).set.is_some());
            assert!((*table).set_multivar.is_some());
            assert!((*table).del.is_some());
            assert!((*table).del_multivar.is_some());
            assert!((*table).iterator.is_some());
            assert!((*table).snapshot.is_some());
            assert!((*table).lock.is_some());
            assert!((*table).unlock.is_some());
            assert!((*table).free.is_some());
            assert_eq!((*table).readonly, 0);
            call_free(table);
        }
    }

    #[test]
    fn test_set_get_del_round_trip_through_the_table() {
        let table = setup();
        unsafe {
            let (name, value, level) = call_get(table, "core.bare").unwrap();
            assert_eq!(name, "core.bare");
            assert_eq!(value, "true");
            assert_eq!(level, ConfigLevel::Local.as_raw());

            assert_eq!(call_set(table, "user.name", "alice"), codes::OK);
            assert_eq!(call_get(table, "user.name").unwrap().1, "alice");

            let key = CString::new("user.name").unwrap();
            assert_eq!(((*table).del.unwrap())(table, key.as_ptr()), codes::OK);
            assert_eq!(call_get(table, "user.name").unwrap_err(), codes::ENOTFOUND);

            call_free(table);
        }
    }

    #[test]
    fn test_missing_key_is_enotfound_without_message() {
        let _serial = test_serial();
        let table = setup();
        unsafe {
            clear_last_error();
            assert_eq!(call_get(table, "no.such.key").unwrap_err(), codes::ENOTFOUND);
            assert!(last_error().is_none());
            call_free(table);
        }
    }

    #[test]
    fn test_multivar_update_through_the_table() {
        let table = setup();
        unsafe {
            let name = CString::new("core.*").unwrap();
            let pattern = CString::new(".*").unwrap();
            let value = CString::new("x").unwrap();
            let code = ((*table).set_multivar.unwrap())(
                table,
                name.as_ptr(),
                pattern.as_ptr(),
                value.as_ptr(),
            );
            assert_eq!(code, codes::OK);
            assert_eq!(call_get(table, "core.bare").unwrap().1, "x");
            call_free(table);
        }
    }

    #[test]
    fn test_open_passes_the_level_through() {
        let table = setup();
        unsafe {
            let code = ((*table).open.unwrap())(table, ConfigLevel::System.as_raw());
            assert_eq!(code, codes::OK);
            assert_eq!(
                call_get(table, "core.bare").unwrap().2,
                ConfigLevel::System.as_raw()
            );
            call_free(table);
        }
    }

    #[test]
    fn test_iterator_drains_and_stays_exhausted() {
        let table = setup();
        unsafe {
            assert_eq!(call_set(table, "user.name", "alice"), codes::OK);

            let mut iter: *mut RawConfigIterator = ptr::null_mut();
            assert_eq!(((*table).iterator.unwrap())(&mut iter, table), codes::OK);

            let next = (*iter).next.unwrap();
            let mut seen = Vec::new();
            loop {
                let mut entry = RawConfigEntry::zeroed();
                let code = next(&mut entry, iter);
                if code == codes::ITEROVER {
                    break;
                }
                assert_eq!(code, codes::OK);
                seen.push(CStr::from_ptr(entry.name).to_str().unwrap().to_string());
                config_entry_dispose(&mut entry);
            }
            assert_eq!(seen, ["core.bare", "user.name"]);

            // exhaustion is terminal
            let mut entry = RawConfigEntry::zeroed();
            assert_eq!(next(&mut entry, iter), codes::ITEROVER);

            ((*iter).free.unwrap())(iter);
            call_free(table);
        }
    }

    #[test]
    fn test_snapshot_is_readonly_and_isolated() {
        // the rejected write below lands in the process-wide error slot
        let _serial = test_serial();
        let table = setup();
        unsafe {
            let mut snapshot: *mut RawConfigBackend = ptr::null_mut();
            assert_eq!(((*table).snapshot.unwrap())(&mut snapshot, table), codes::OK);
            assert_eq!((*snapshot).readonly, 1);

            assert_eq!(call_set(table, "core.bare", "false"), codes::OK);

            // the snapshot still sees the state it captured
            assert_eq!(call_get(snapshot, "core.bare").unwrap().1, "true");
            assert_eq!(call_get(table, "core.bare").unwrap().1, "false");

            // and rejects writes
            assert_eq!(call_set(snapshot, "core.bare", "x"), codes::ERROR);

            call_free(snapshot);
            call_free(table);
        }
    }

    #[test]
    fn test_lock_unlock_commit_cycle() {
        let table = setup();
        unsafe {
            assert_eq!(((*table).lock.unwrap())(table), codes::OK);
            assert_eq!(call_set(table, "core.bare", "false"), codes::OK);
            // buffered: reads still see the committed value
            assert_eq!(call_get(table, "core.bare").unwrap().1, "true");

            let mut committed: c_int = -1;
            assert_eq!(((*table).unlock.unwrap())(table, &mut committed), codes::OK);
            assert_eq!(committed, 1);
            assert_eq!(call_get(table, "core.bare").unwrap().1, "false");

            // no section open: success with nothing committed
            let mut committed: c_int = -1;
            assert_eq!(((*table).unlock.unwrap())(table, &mut committed), codes::OK);
            assert_eq!(committed, 0);

            call_free(table);
        }
    }

    #[test]
    fn test_panicking_backend_is_contained() {
        let _serial = test_serial();
        let table = export_backend(PanickingBackend);
        unsafe {
            clear_last_error();
            assert_eq!(call_get(table, "any.key").unwrap_err(), codes::ERROR);

            let last = last_error().unwrap();
            assert_eq!(last.category, ErrorCategory::Callback);
            assert_eq!(last.message, "config backend exploded");

            call_free(table);
        }
    }

    #[test]
    fn test_stale_token_after_free() {
        let _serial = test_serial();
        let table = setup();
        unsafe {
            // keep a copy of the slots on the stack; the real allocation is
            // about to go away and must not be touched again
            let mut copy = ptr::read(table);
            call_free(table);

            clear_last_error();
            let code = call_get(&mut copy, "core.bare").unwrap_err();
            assert_eq!(code, codes::ERROR);
            assert_eq!(
                last_error().unwrap().message,
                "cannot retrieve the config backend"
            );
        }
    }

    #[test]
    fn test_double_free_is_a_noop() {
        let table = setup();
        unsafe {
            let mut copy = ptr::read(table);
            call_free(table);
            // second free through the stale copy: token no longer resolves
            call_free(&mut copy);
        }
    }

    #[test]
    fn test_free_drops_the_backend_instance() {
        let dropped = Arc::new(AtomicBool::new(false));
        let table = export_backend(DropFlagBackend {
            dropped: Arc::clone(&dropped),
        });

        assert!(!dropped.load(Ordering::SeqCst));
        unsafe { call_free(table) };
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_invalid_utf8_key_is_rejected() {
        let _serial = test_serial();
        let table = setup();
        unsafe {
            clear_last_error();
            let bad = CString::new([0xffu8, 0xfe].as_slice()).unwrap();
            let mut entry = RawConfigEntry::zeroed();
            let code = ((*table).get.unwrap())(table, bad.as_ptr(), &mut entry);
            assert_eq!(code, codes::ERROR);
            assert_eq!(
                last_error().unwrap().message,
                "argument 'key' is not valid UTF-8"
            );
            call_free(table);
        }
    }
}
