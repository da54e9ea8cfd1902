//! The native-visible surface of the bridge.
//!
//! Everything the native core sees lives here: the `#[repr(C)]` operation
//! tables and entry/reference records, the status-code convention, the
//! last-error channel it reads after a negative return, and the string
//! marshaling helpers that allocate and free memory across the boundary.
//!
//! Layout is a contract. Field order and slot count in the table structs
//! match what the core expects and are not freely reorderable.

pub mod codes;
pub mod config;
pub mod entry;
pub mod last_error;
pub mod refdb;
pub mod strings;

pub(crate) mod boundary;

pub use entry::{config_entry_dispose, RawConfigEntry};
pub use last_error::{
    clear_last_error, last_error, set_last_error, take_last_error, ErrorCategory, LastError,
};
pub use refdb::{reference_dispose, RawOid, RawReference, RawSignature};
pub use strings::dispose_string;
