//! gitbridge - Pluggable Backends for a Native Version-Control Core
//!
//! This crate lets host code supply its own configuration and reference
//! storage to a libgit2-style native core. A backend is an ordinary Rust
//! trait implementation; exporting it builds a versioned `#[repr(C)]`
//! operation table whose slots trampoline back into the instance, with
//! panics contained at the boundary and failure detail reported through
//! a process-wide last-error channel.
//!
//! # Example
//!
//! ```no_run
//! use gitbridge::config::{self, ConfigLevel, MemoryConfigBackend};
//!
//! let backend = MemoryConfigBackend::with_entries(
//!     ConfigLevel::Local,
//!     [("core.bare", "false"), ("user.name", "alice")],
//! );
//! let table = config::export_backend(backend);
//! // hand `table` to the native core; it drives the backend through the
//! // slots and eventually calls the table's free slot
//! # unsafe { ((*table).free.unwrap())(table) };
//! ```

pub mod config;
pub mod errors;
pub mod handles;
pub mod raw;
pub mod refdb;
pub mod types;
pub mod version;
