//! The last-error channel.
//!
//! Native callers read error detail out of band: a negative return means
//! "look at the last error". This is a process-wide, overwrite-on-set slot;
//! the most recent failure wins. Expected outcomes (not found, iteration
//! exhausted) never touch it.

use parking_lot::Mutex;

/// Which subsystem reported the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// configuration backend or iterator
    Config,
    /// reference backend, iterator, or transaction
    Reference,
    /// failure raised inside host-supplied callback code
    Callback,
}

/// The message and category of the most recent failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub message: String,
    pub category: ErrorCategory,
}

static SLOT: Mutex<Option<LastError>> = Mutex::new(None);

/// Record an error, replacing whatever was there.
pub fn set_last_error(category: ErrorCategory, message: impl Into<String>) {
    let error = LastError {
        message: message.into(),
        category,
    };
    tracing::debug!(
        target: "gitbridge.dispatch",
        category = ?error.category,
        message = %error.message,
        "last error set"
    );
    *SLOT.lock() = Some(error);
}

/// Read the most recent error without clearing it.
pub fn last_error() -> Option<LastError> {
    SLOT.lock().clone()
}

/// Read and clear the most recent error.
pub fn take_last_error() -> Option<LastError> {
    SLOT.lock().take()
}

/// Clear the slot.
pub fn clear_last_error() {
    *SLOT.lock() = None;
}

/// Serializes tests that assert on the process-wide slot.
#[cfg(test)]
pub(crate) fn test_serial() -> parking_lot::MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_on_set() {
        let _serial = test_serial();

        set_last_error(ErrorCategory::Config, "first");
        set_last_error(ErrorCategory::Reference, "second");

        let last = last_error().unwrap();
        assert_eq!(last.message, "second");
        assert_eq!(last.category, ErrorCategory::Reference);

        clear_last_error();
        assert!(last_error().is_none());
    }

    #[test]
    fn test_take_clears_the_slot() {
        let _serial = test_serial();

        set_last_error(ErrorCategory::Callback, "panic in backend");
        let taken = take_last_error().unwrap();
        assert_eq!(taken.message, "panic in backend");
        assert!(take_last_error().is_none());
    }
}
