//! Status codes returned across the native boundary.
//!
//! The values follow the native core's convention: zero for success,
//! distinguished negatives for the expected "not found" and "iteration
//! exhausted" outcomes, and `-1` as the generic failure everything else
//! collapses into. A few extra negatives carry condition detail the core
//! understands (exists, locked, modified, bad name).

use std::ffi::c_int;

use crate::errors::BackendError;

/// success
pub const OK: c_int = 0;
/// generic failure; details in the last-error channel
pub const ERROR: c_int = -1;
/// requested key or reference does not exist
pub const ENOTFOUND: c_int = -3;
/// target exists and the operation was not forced
pub const EEXISTS: c_int = -4;
/// name failed validation
pub const EINVALIDSPEC: c_int = -12;
/// store is locked
pub const ELOCKED: c_int = -14;
/// stored value no longer matches the expected old value
pub const EMODIFIED: c_int = -15;
/// iterator has no more entries; terminal
pub const ITEROVER: c_int = -31;

/// Map an adapter error onto the status-code convention.
pub fn code_for(error: &BackendError) -> c_int {
    match error {
        BackendError::NotFound(_) => ENOTFOUND,
        BackendError::AlreadyExists(_) => EEXISTS,
        BackendError::Modified(_) => EMODIFIED,
        BackendError::Locked => ELOCKED,
        BackendError::InvalidName(_) => EINVALIDSPEC,
        _ => ERROR,
    }
}
