//! reference iteration and symbolic resolution.
//!
//! Backends hand out plain cursors; the walking intelligence lives here.
//! A symbolic reference whose target is gone is a broken alias, and the
//! native core expects broken aliases to vanish from iteration rather
//! than surface as errors. Both walkers are loops, not recursion, so a
//! store full of broken or circular aliases cannot exhaust the stack.

use std::collections::HashSet;

use crate::errors::BackendResult;
use crate::types::RefName;

use super::backend::{RefTarget, Reference, RefdbBackend};

/// A forward-only cursor over reference records.
///
/// Yields raw records in the backend's order without any skip logic;
/// `Ok(None)` is terminal and must repeat forever.
pub trait RefdbIterator: Send + 'static {
    /// advance and return the next record, or `Ok(None)` when exhausted
    fn next(&mut self) -> BackendResult<Option<Reference>>;
}

/// Advance to the next reference that is not a broken alias.
///
/// Direct records pass through. A symbolic record passes only when its
/// immediate target exists in the backend (as either kind); otherwise it
/// is skipped silently and scanning continues. Surviving records keep the
/// backend's iteration order.
pub fn next_existing<B: RefdbBackend>(
    backend: &B,
    iter: &mut B::Iter,
) -> BackendResult<Option<Reference>> {
    loop {
        let Some(candidate) = iter.next()? else {
            return Ok(None);
        };
        match &candidate.target {
            RefTarget::Direct(_) => return Ok(Some(candidate)),
            RefTarget::Symbolic(target) => {
                if backend.exists(target)? {
                    return Ok(Some(candidate));
                }
                // broken alias, skip and keep scanning
            }
        }
    }
}

/// Name-only variant of [`next_existing`], sharing its skip logic.
pub fn next_existing_name<B: RefdbBackend>(
    backend: &B,
    iter: &mut B::Iter,
) -> BackendResult<Option<RefName>> {
    Ok(next_existing(backend, iter)?.map(Reference::into_name))
}

/// Follow a symbolic chain to its direct record.
///
/// A dangling target and a revisited name (a cycle) both come out as
/// `Ok(None)` — to a caller they are the same thing: the name does not
/// lead anywhere. The visited set bounds the walk; no depth limit from
/// the caller is assumed.
pub fn resolve<B: RefdbBackend>(backend: &B, name: &RefName) -> BackendResult<Option<Reference>> {
    let mut visited = HashSet::new();
    let mut current = name.clone();

    loop {
        if !visited.insert(current.clone()) {
            return Ok(None);
        }
        let Some(reference) = backend.lookup(&current)? else {
            return Ok(None);
        };
        match &reference.target {
            RefTarget::Direct(_) => return Ok(Some(reference)),
            RefTarget::Symbolic(next) => current = next.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refdb::MemoryRefdb;
    use crate::types::{ObjectId, RefName};

    fn refname(name: &str) -> RefName {
        RefName::new(name).unwrap()
    }

    fn oid(tail: u8) -> ObjectId {
        let mut bytes = [0u8; 20];
        bytes[19] = tail;
        ObjectId::from_bytes(bytes)
    }

    fn setup() -> MemoryRefdb {
        let mut backend = MemoryRefdb::new();
        backend
            .write(
                &Reference::direct(refname("refs/heads/main"), oid(1)),
                false,
                None,
                None,
                None,
                None,
            )
            .unwrap();
        backend
            .write(
                &Reference::symbolic(refname("HEAD"), refname("refs/heads/main")),
                false,
                None,
                None,
                None,
                None,
            )
            .unwrap();
        backend
    }

    fn drain_names(backend: &MemoryRefdb) -> Vec<String> {
        let mut iter = backend.iterator(None).unwrap();
        let mut names = Vec::new();
        while let Some(name) = next_existing_name(backend, &mut iter).unwrap() {
            names.push(name.into_string());
        }
        names
    }

    #[test]
    fn test_intact_chain_emits_the_symbolic_record() {
        let backend = setup();
        assert_eq!(drain_names(&backend), ["HEAD", "refs/heads/main"]);
    }

    #[test]
    fn test_broken_alias_is_skipped() {
        let mut backend = setup();
        backend
            .delete(&refname("refs/heads/main"), None, None)
            .unwrap();

        assert!(drain_names(&backend).is_empty());
    }

    #[test]
    fn test_skip_does_not_reorder_survivors() {
        let mut backend = setup();
        backend
            .write(
                &Reference::symbolic(refname("refs/broken"), refname("refs/gone")),
                false,
                None,
                None,
                None,
                None,
            )
            .unwrap();
        backend
            .write(
                &Reference::direct(refname("refs/tags/v1"), oid(2)),
                false,
                None,
                None,
                None,
                None,
            )
            .unwrap();

        assert_eq!(
            drain_names(&backend),
            ["HEAD", "refs/heads/main", "refs/tags/v1"]
        );
    }

    #[test]
    fn test_exhaustion_is_terminal() {
        let backend = setup();
        let mut iter = backend.iterator(None).unwrap();
        while next_existing(&backend, &mut iter).unwrap().is_some() {}

        assert!(next_existing(&backend, &mut iter).unwrap().is_none());
        assert!(next_existing(&backend, &mut iter).unwrap().is_none());
    }

    #[test]
    fn test_alias_to_alias_survives_single_level_check() {
        let mut backend = setup();
        // indirect -> HEAD -> refs/heads/main; HEAD exists, so the
        // single-level check keeps the record
        backend
            .write(
                &Reference::symbolic(refname("refs/indirect"), refname("HEAD")),
                false,
                None,
                None,
                None,
                None,
            )
            .unwrap();

        assert_eq!(
            drain_names(&backend),
            ["HEAD", "refs/heads/main", "refs/indirect"]
        );
    }

    #[test]
    fn test_resolve_follows_chains_to_the_direct_record() {
        let mut backend = setup();
        backend
            .write(
                &Reference::symbolic(refname("refs/indirect"), refname("HEAD")),
                false,
                None,
                None,
                None,
                None,
            )
            .unwrap();

        let resolved = resolve(&backend, &refname("refs/indirect"))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.name.as_str(), "refs/heads/main");
        assert_eq!(resolved.target, RefTarget::Direct(oid(1)));
    }

    #[test]
    fn test_resolve_missing_and_dangling_are_none() {
        let mut backend = setup();
        assert!(resolve(&backend, &refname("refs/nope")).unwrap().is_none());

        backend
            .delete(&refname("refs/heads/main"), None, None)
            .unwrap();
        assert!(resolve(&backend, &refname("HEAD")).unwrap().is_none());
    }

    #[test]
    fn test_resolve_breaks_cycles() {
        let mut backend = MemoryRefdb::new();
        backend
            .write(
                &Reference::symbolic(refname("refs/a"), refname("refs/b")),
                false,
                None,
                None,
                None,
                None,
            )
            .unwrap();
        backend
            .write(
                &Reference::symbolic(refname("refs/b"), refname("refs/a")),
                false,
                None,
                None,
                None,
                None,
            )
            .unwrap();

        assert!(resolve(&backend, &refname("refs/a")).unwrap().is_none());
        // self-loop is the one-step cycle
        backend
            .write(
                &Reference::symbolic(refname("refs/selfie"), refname("refs/selfie")),
                false,
                None,
                None,
                None,
                None,
            )
            .unwrap();
        assert!(resolve(&backend, &refname("refs/selfie")).unwrap().is_none());
    }
}
