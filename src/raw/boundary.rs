//! The failure boundary shared by every dispatch trampoline.
//!
//! No panic and no `Result` may cross into native code. Adapter calls run
//! under `catch_unwind`; the outcome collapses to a status code here, and
//! failure messages land in the last-error channel. Expected absences
//! (`NotFound`) stay silent per the boundary convention.

use std::any::Any;
use std::ffi::c_int;
use std::panic::{self, AssertUnwindSafe};

use crate::errors::BackendError;
use crate::raw::codes;
use crate::raw::last_error::{set_last_error, ErrorCategory};

/// Run an adapter operation behind the panic barrier.
///
/// `Err` carries the status code to return; the message (when one applies)
/// has already been recorded.
pub(crate) fn run_guarded<T>(
    category: ErrorCategory,
    op: impl FnOnce() -> Result<T, BackendError>,
) -> Result<T, c_int> {
    match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => {
            let code = codes::code_for(&error);
            if !error.is_not_found() {
                set_last_error(category, error.to_string());
            }
            Err(code)
        }
        Err(payload) => {
            tracing::warn!(target: "gitbridge.dispatch", "backend panicked across the boundary");
            set_last_error(ErrorCategory::Callback, panic_message(payload));
            Err(codes::ERROR)
        }
    }
}

/// Record a boundary failure (bad pointer, stale token) and hand back the
/// generic error code.
pub(crate) fn boundary_error(category: ErrorCategory, message: impl Into<String>) -> c_int {
    set_last_error(category, message);
    codes::ERROR
}

/// Run a release path that has no return channel.
///
/// Free slots return nothing, so a panicking teardown can only report
/// through the last-error channel. It must never unwind into native code.
pub(crate) fn run_release(category: ErrorCategory, op: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(op)) {
        let message = panic_message(payload);
        tracing::warn!(
            target: "gitbridge.dispatch",
            message = %message,
            "panic during release"
        );
        set_last_error(category, message);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "backend panicked".to_string()
    }
}
