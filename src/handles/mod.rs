//! Handle lifetime management.
//!
//! Native code never holds a Rust reference to a backend. It holds an opaque
//! token stored in the operation table it was handed, and every dispatch
//! entry point turns that token back into the owning instance through the
//! registry in this module. The registry keeps the instance (and the heap
//! allocation of its table) alive until the native core signals free, and
//! makes a stale or double free a harmless no-op instead of memory
//! corruption.

mod registry;

pub use registry::{Handle, HandleRegistry, NativeTable};
