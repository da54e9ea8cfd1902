//! The configuration entry record as native code sees it.

use std::ffi::{c_char, c_uint};
use std::ptr;

use crate::raw::strings::dispose_string;

/// One configuration entry, written into caller-provided storage by the
/// `get` and iterator `next` entry points.
///
/// `name` and `value` are bridge-allocated and owned by the native caller
/// until it frees them through [`config_entry_dispose`] (or field-wise via
/// [`dispose_string`](crate::raw::dispose_string)).
#[repr(C)]
#[derive(Debug)]
pub struct RawConfigEntry {
    pub name: *mut c_char,
    pub value: *mut c_char,
    pub level: c_uint,
}

impl RawConfigEntry {
    /// an empty record for the caller to pass as output storage
    pub fn zeroed() -> Self {
        Self {
            name: ptr::null_mut(),
            value: ptr::null_mut(),
            level: 0,
        }
    }
}

/// Free the strings inside an entry and NULL the fields.
///
/// The entry storage itself belongs to the caller. Safe to call with NULL
/// or on an already-disposed entry.
///
/// # Safety
/// `entry` must be NULL or point to a valid entry whose string fields were
/// allocated by this bridge and not yet freed.
pub unsafe extern "C" fn config_entry_dispose(entry: *mut RawConfigEntry) {
    if entry.is_null() {
        return;
    }
    dispose_string((*entry).name);
    dispose_string((*entry).value);
    (*entry).name = ptr::null_mut();
    (*entry).value = ptr::null_mut();
}
