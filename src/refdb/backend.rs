//! the reference database backend contract.

use crate::errors::{BackendError, BackendResult};
use crate::types::{ObjectId, RefName, Signature};

use super::iterator::RefdbIterator;

bitflags::bitflags! {
    /// The set of optional operations a reference backend implements.
    ///
    /// Same convention as the configuration side: declared once through
    /// [`RefdbBackend::supported_operations`], flags left out leave their
    /// slots NULL, and there is no `Default`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RefdbOps: u32 {
        /// existence probe
        const EXISTS = 1 << 0;
        /// single-reference lookup
        const LOOKUP = 1 << 1;
        /// reference iteration, optionally glob-filtered
        const ITERATOR = 1 << 2;
        /// create or update, with force and compare-and-swap preconditions
        const WRITE = 1 << 3;
        /// rename, with force
        const RENAME = 1 << 4;
        /// delete, with compare-and-swap preconditions
        const DELETE = 1 << 5;
        /// storage optimization pass
        const COMPRESS = 1 << 6;
        /// release the backend; the exported slot is populated regardless
        const FREE = 1 << 7;
    }
}

/// What a reference points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    /// points straight at an object
    Direct(ObjectId),
    /// points at another reference by name
    Symbolic(RefName),
}

/// One named pointer in the reference store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: RefName,
    pub target: RefTarget,
}

impl Reference {
    /// a reference pointing straight at an object
    pub fn direct(name: RefName, id: ObjectId) -> Self {
        Self {
            name,
            target: RefTarget::Direct(id),
        }
    }

    /// a reference aliasing another reference
    pub fn symbolic(name: RefName, target: RefName) -> Self {
        Self {
            name,
            target: RefTarget::Symbolic(target),
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self.target, RefTarget::Symbolic(_))
    }

    pub fn into_name(self) -> RefName {
        self.name
    }
}

/// A host-supplied reference store.
///
/// Implement this and hand the instance to
/// [`export_backend`](super::export_backend). As with the configuration
/// side, every operation except [`supported_operations`] defaults to
/// [`BackendError::Unsupported`].
///
/// Contracts the core relies on:
/// - `lookup` reports an absent name as `Ok(None)`, never as an error
/// - `write` with `old_id`/`old_target` set must fail with a modified
///   error when the stored value no longer matches, and with not-found
///   when the reference is absent; without them, an existing reference
///   fails with already-exists unless `force` is set
/// - `delete` honors the same preconditions
/// - iteration order is the backend's own, but must be stable within one
///   cursor
///
/// [`supported_operations`]: RefdbBackend::supported_operations
pub trait RefdbBackend: Send + 'static {
    /// the cursor type handed out by [`iterator`](RefdbBackend::iterator)
    type Iter: RefdbIterator;

    /// The operations this backend implements.
    ///
    /// Required: the exported table populates exactly these slots.
    fn supported_operations(&self) -> RefdbOps;

    /// whether `name` exists in the store
    fn exists(&self, name: &RefName) -> BackendResult<bool> {
        let _ = name;
        Err(BackendError::Unsupported("exists"))
    }

    /// look up a reference; absent names are `Ok(None)`
    fn lookup(&self, name: &RefName) -> BackendResult<Option<Reference>> {
        let _ = name;
        Err(BackendError::Unsupported("lookup"))
    }

    /// A fresh cursor over the store.
    ///
    /// `glob` filters names with `*` wildcards; `None` iterates everything.
    fn iterator(&self, glob: Option<&str>) -> BackendResult<Self::Iter> {
        let _ = glob;
        Err(BackendError::Unsupported("iterator"))
    }

    /// create or update a reference
    fn write(
        &mut self,
        reference: &Reference,
        force: bool,
        who: Option<&Signature>,
        message: Option<&str>,
        old_id: Option<&ObjectId>,
        old_target: Option<&RefName>,
    ) -> BackendResult<()> {
        let _ = (reference, force, who, message, old_id, old_target);
        Err(BackendError::Unsupported("write"))
    }

    /// rename a reference, returning the renamed record
    fn rename(
        &mut self,
        old_name: &RefName,
        new_name: &RefName,
        force: bool,
        who: Option<&Signature>,
        message: Option<&str>,
    ) -> BackendResult<Reference> {
        let _ = (old_name, new_name, force, who, message);
        Err(BackendError::Unsupported("rename"))
    }

    /// delete a reference
    fn delete(
        &mut self,
        name: &RefName,
        old_id: Option<&ObjectId>,
        old_target: Option<&RefName>,
    ) -> BackendResult<()> {
        let _ = (name, old_id, old_target);
        Err(BackendError::Unsupported("delete"))
    }

    /// optimize storage; a no-op for backends that are already compact
    fn compress(&mut self) -> BackendResult<()> {
        Err(BackendError::Unsupported("compress"))
    }
}
