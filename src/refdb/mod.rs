//! reference database backends and their native dispatch layer.
//!
//! ```text
//!                     native core
//!                         |
//!                 RawRefdbBackend table          (raw::refdb)
//!                         |
//!            trampolines + handle registry       (refdb::bridge)
//!                   /            \
//!       RefdbBackend impl    resolution engine   (refdb::iterator)
//!       (memory, yours)      next_existing / resolve
//! ```
//!
//! A backend stores references — direct entries carrying an object id and
//! symbolic entries carrying another reference's name. [`export_backend`]
//! turns any [`RefdbBackend`] into an operation table the native core can
//! drive; unsupported operations are NULL slots the core probes for.
//!
//! Iteration never hands a broken symbolic reference to the core: the
//! resolution engine checks each symbolic candidate one level deep and
//! silently skips aliases whose target is gone. [`resolve`] walks chains
//! to a direct reference, treating cycles and dangling links as absent.
//!
//! ```ignore
//! use gitbridge::refdb::{self, MemoryRefdb, Reference};
//! use gitbridge::types::{ObjectId, RefName};
//!
//! let mut db = MemoryRefdb::new();
//! let main = RefName::new("refs/heads/main")?;
//! db.write(
//!     &Reference::direct(main.clone(), ObjectId::zero()),
//!     false, None, None, None, None,
//! )?;
//! let table = refdb::export_backend(db);
//! // hand `table` to the native core; it calls back through the slots
//! ```

mod backend;
mod bridge;
mod iterator;
mod memory;
mod transaction;

pub use backend::{RefTarget, Reference, RefdbBackend, RefdbOps};
pub use bridge::export_backend;
pub use iterator::{next_existing, next_existing_name, resolve, RefdbIterator};
pub use memory::{MemoryRefdb, MemoryRefdbIterator};
pub use transaction::RefTransaction;
