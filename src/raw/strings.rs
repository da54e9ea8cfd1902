//! C string marshaling across the native boundary.
//!
//! Outbound strings are allocated here and owned by native code until it
//! frees them through [`dispose_string`]. Inbound strings are borrowed for
//! the duration of the call and validated (non-NULL, UTF-8) before any
//! adapter code sees them.

use std::ffi::{c_char, CStr, CString};

use crate::errors::BackendError;

/// Allocate a native-owned copy of `s`.
///
/// Fails on interior NUL; the caller turns that into a generic error.
pub(crate) fn export_string(s: &str) -> Result<*mut c_char, BackendError> {
    CString::new(s)
        .map(CString::into_raw)
        .map_err(|_| BackendError::Message(format!("string contains an interior NUL: {s:?}")))
}

/// Free a string previously allocated by this bridge.
///
/// Safe to call with NULL.
///
/// # Safety
/// `ptr` must be NULL or a pointer obtained from this crate's allocation
/// functions, not yet freed.
pub unsafe extern "C" fn dispose_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Borrow a native-supplied string for the duration of a call.
///
/// `what` names the argument in the failure message.
///
/// # Safety
/// `ptr` must be NULL or point to a NUL-terminated string that stays valid
/// for the borrow.
pub(crate) unsafe fn import_str<'a>(
    ptr: *const c_char,
    what: &str,
) -> Result<&'a str, BackendError> {
    if ptr.is_null() {
        return Err(BackendError::Message(format!("argument '{what}' is null")));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| BackendError::Message(format!("argument '{what}' is not valid UTF-8")))
}

/// Like [`import_str`] but treats NULL as absent rather than an error.
///
/// # Safety
/// Same as [`import_str`].
pub(crate) unsafe fn import_opt_str<'a>(
    ptr: *const c_char,
    what: &str,
) -> Result<Option<&'a str>, BackendError> {
    if ptr.is_null() {
        return Ok(None);
    }
    import_str(ptr, what).map(Some)
}
