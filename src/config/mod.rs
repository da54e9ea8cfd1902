//! configuration backend layer
//!
//! everything needed to plug a host key/value store into the native
//! core's configuration subsystem. A backend implements [`ConfigBackend`],
//! gets exported as a `#[repr(C)]` operation table, and the dispatch layer
//! routes native calls back into it.
//!
//! # Architecture
//!
//! ```text
//!   native core
//!       │  calls table slots
//!       ▼
//! ┌───────────────────┐     token      ┌──────────────────────┐
//! │ RawConfigBackend  │ ─────────────▶ │   HandleRegistry     │
//! │ (repr(C) table)   │                │ (owns the instance)  │
//! └───────────────────┘                └──────────────────────┘
//!       │  trampolines (bridge)                  │
//!       ▼                                        ▼
//! ┌────────────────────────────────────────────────────┐
//! │ ConfigBackend impl                                 │
//! │ (MemoryConfigBackend, FileConfigBackend, custom)   │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use gitbridge::config::{export_backend, ConfigLevel, MemoryConfigBackend};
//!
//! let backend = MemoryConfigBackend::with_entries(
//!     ConfigLevel::Local,
//!     [("core.bare", "false")],
//! );
//!
//! // the table pointer is what gets handed to the native core
//! let table = export_backend(backend);
//!
//! // the core eventually releases it through the free slot
//! unsafe { ((*table).free.unwrap())(table) };
//! ```

mod backend;
mod bridge;
mod file;
mod iterator;
mod memory;
mod store;

pub use backend::{ConfigBackend, ConfigEntry, ConfigLevel, ConfigOps};
pub use bridge::export_backend;
pub use file::FileConfigBackend;
pub use iterator::ConfigIterator;
pub use memory::{MemoryConfigBackend, MemoryConfigIterator};
pub use store::EntryStore;
