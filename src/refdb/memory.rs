//! in-memory reference database.

use std::collections::BTreeMap;

use regex::Regex;

use crate::errors::{BackendError, BackendResult};
use crate::types::{ObjectId, RefName, Signature};

use super::backend::{RefTarget, Reference, RefdbBackend, RefdbOps};
use super::iterator::RefdbIterator;

/// Volatile reference store with deterministic (name-sorted) iteration,
/// the reference backend for tests and the harness.
///
/// Write and delete honor the compare-and-swap preconditions: when an
/// expected old value is supplied, the stored value must match it, and a
/// missing reference is reported as not found.
#[derive(Debug, Clone, Default)]
pub struct MemoryRefdb {
    refs: BTreeMap<RefName, RefTarget>,
}

impl MemoryRefdb {
    pub fn new() -> Self {
        Self::default()
    }

    /// number of stored references
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    fn check_expectations(
        &self,
        name: &RefName,
        old_id: Option<&ObjectId>,
        old_target: Option<&RefName>,
    ) -> BackendResult<()> {
        if old_id.is_none() && old_target.is_none() {
            return Ok(());
        }

        let Some(current) = self.refs.get(name) else {
            return Err(BackendError::NotFound(format!(
                "reference '{name}' not found"
            )));
        };

        let matches = match (current, old_id, old_target) {
            (RefTarget::Direct(id), Some(expected), _) => id == expected,
            (RefTarget::Symbolic(target), _, Some(expected)) => target == expected,
            _ => false,
        };
        if !matches {
            return Err(BackendError::Modified(name.to_string()));
        }
        Ok(())
    }
}

impl RefdbBackend for MemoryRefdb {
    type Iter = MemoryRefdbIterator;

    fn supported_operations(&self) -> RefdbOps {
        RefdbOps::all()
    }

    fn exists(&self, name: &RefName) -> BackendResult<bool> {
        Ok(self.refs.contains_key(name))
    }

    fn lookup(&self, name: &RefName) -> BackendResult<Option<Reference>> {
        Ok(self.refs.get(name).map(|target| Reference {
            name: name.clone(),
            target: target.clone(),
        }))
    }

    fn iterator(&self, glob: Option<&str>) -> BackendResult<MemoryRefdbIterator> {
        let matcher = glob.map(glob_regex).transpose()?;
        let records: Vec<Reference> = self
            .refs
            .iter()
            .filter(|(name, _)| {
                matcher
                    .as_ref()
                    .map_or(true, |matcher| matcher.is_match(name.as_str()))
            })
            .map(|(name, target)| Reference {
                name: name.clone(),
                target: target.clone(),
            })
            .collect();
        Ok(MemoryRefdbIterator {
            remaining: records.into_iter(),
        })
    }

    fn write(
        &mut self,
        reference: &Reference,
        force: bool,
        _who: Option<&Signature>,
        _message: Option<&str>,
        old_id: Option<&ObjectId>,
        old_target: Option<&RefName>,
    ) -> BackendResult<()> {
        let has_expectation = old_id.is_some() || old_target.is_some();
        self.check_expectations(&reference.name, old_id, old_target)?;

        // a matched expectation authorizes the overwrite by itself
        if !has_expectation && !force && self.refs.contains_key(&reference.name) {
            return Err(BackendError::AlreadyExists(reference.name.to_string()));
        }

        self.refs
            .insert(reference.name.clone(), reference.target.clone());
        Ok(())
    }

    fn rename(
        &mut self,
        old_name: &RefName,
        new_name: &RefName,
        force: bool,
        _who: Option<&Signature>,
        _message: Option<&str>,
    ) -> BackendResult<Reference> {
        let Some(target) = self.refs.get(old_name).cloned() else {
            return Err(BackendError::NotFound(format!(
                "reference '{old_name}' not found"
            )));
        };

        if old_name != new_name && !force && self.refs.contains_key(new_name) {
            return Err(BackendError::AlreadyExists(new_name.to_string()));
        }

        self.refs.remove(old_name);
        self.refs.insert(new_name.clone(), target.clone());
        Ok(Reference {
            name: new_name.clone(),
            target,
        })
    }

    fn delete(
        &mut self,
        name: &RefName,
        old_id: Option<&ObjectId>,
        old_target: Option<&RefName>,
    ) -> BackendResult<()> {
        self.check_expectations(name, old_id, old_target)?;

        if self.refs.remove(name).is_none() {
            return Err(BackendError::NotFound(format!(
                "reference '{name}' not found"
            )));
        }
        Ok(())
    }

    fn compress(&mut self) -> BackendResult<()> {
        // storage is a map; there is nothing to compact
        Ok(())
    }
}

/// Forward cursor over a point-in-time copy of the store, in name order.
#[derive(Debug)]
pub struct MemoryRefdbIterator {
    remaining: std::vec::IntoIter<Reference>,
}

impl RefdbIterator for MemoryRefdbIterator {
    fn next(&mut self) -> BackendResult<Option<Reference>> {
        Ok(self.remaining.next())
    }
}

/// translate a `*` glob into an anchored regex over whole names
fn glob_regex(glob: &str) -> BackendResult<Regex> {
    let parts: Vec<String> = glob.split('*').map(regex::escape).collect();
    let pattern = format!("^{}$", parts.join(".*"));
    Ok(Regex::new(&pattern)?)
}

#[cfg(test)]
mod tests {
    use super::*;

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
                &Reference::direct(refname("refs/heads/dev"), oid(2)),
                false,
                None,
                None,
                None,
                None,
            )
            .unwrap();
        backend
            .write(
                &Reference::direct(refname("refs/tags/v1"), oid(3)),
                false,
                None,
                None,
                None,
                None,
            )
            .unwrap();
        backend
    }

    #[test]
    fn test_write_lookup_round_trip() {
        let backend = setup();
        let found = backend.lookup(&refname("refs/heads/main")).unwrap().unwrap();
        assert_eq!(found.target, RefTarget::Direct(oid(1)));
        assert!(backend.lookup(&refname("refs/heads/gone")).unwrap().is_none());
        assert!(backend.exists(&refname("refs/tags/v1")).unwrap());
    }

    #[test]
    fn test_unforced_overwrite_is_rejected() {
        let mut backend = setup();
        let update = Reference::direct(refname("refs/heads/main"), oid(9));

        let err = backend
            .write(&update, false, None, None, None, None)
            .unwrap_err();
        assert!(matches!(err, BackendError::AlreadyExists(_)));

        backend.write(&update, true, None, None, None, None).unwrap();
        assert_eq!(
            backend
                .lookup(&refname("refs/heads/main"))
                .unwrap()
                .unwrap()
                .target,
            RefTarget::Direct(oid(9))
        );
    }

    #[test]
    fn test_write_compare_and_swap() {
        let mut backend = setup();
        let update = Reference::direct(refname("refs/heads/main"), oid(9));

        // wrong expected value
        let err = backend
            .write(&update, false, None, None, Some(&oid(5)), None)
            .unwrap_err();
        assert!(matches!(err, BackendError::Modified(_)));

        // right expected value authorizes the overwrite without force
        backend
            .write(&update, false, None, None, Some(&oid(1)), None)
            .unwrap();

        // expectation against a missing reference
        let absent = Reference::direct(refname("refs/heads/gone"), oid(9));
        let err = backend
            .write(&absent, false, None, None, Some(&oid(1)), None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_symbolic_expectation_checks_the_target_name() {
        let mut backend = setup();
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

        let repoint = Reference::symbolic(refname("HEAD"), refname("refs/heads/dev"));
        let err = backend
            .write(
                &repoint,
                false,
                None,
                None,
                None,
                Some(&refname("refs/heads/other")),
            )
            .unwrap_err();
        assert!(matches!(err, BackendError::Modified(_)));

        backend
            .write(
                &repoint,
                false,
                None,
                None,
                None,
                Some(&refname("refs/heads/main")),
            )
            .unwrap();
    }

    #[test]
    fn test_delete_with_and_without_expectations() {
        let mut backend = setup();

        let err = backend
            .delete(&refname("refs/heads/main"), Some(&oid(5)), None)
            .unwrap_err();
        assert!(matches!(err, BackendError::Modified(_)));

        backend
            .delete(&refname("refs/heads/main"), Some(&oid(1)), None)
            .unwrap();
        assert!(!backend.exists(&refname("refs/heads/main")).unwrap());

        let err = backend
            .delete(&refname("refs/heads/main"), None, None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rename_moves_the_target() {
        let mut backend = setup();
        let renamed = backend
            .rename(
                &refname("refs/heads/dev"),
                &refname("refs/heads/feature"),
                false,
                None,
                None,
            )
            .unwrap();
        assert_eq!(renamed.name.as_str(), "refs/heads/feature");
        assert_eq!(renamed.target, RefTarget::Direct(oid(2)));
        assert!(!backend.exists(&refname("refs/heads/dev")).unwrap());

        // renaming onto an existing name needs force
        let err = backend
            .rename(
                &refname("refs/heads/feature"),
                &refname("refs/heads/main"),
                false,
                None,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, BackendError::AlreadyExists(_)));

        backend
            .rename(
                &refname("refs/heads/feature"),
                &refname("refs/heads/main"),
                true,
                None,
                None,
            )
            .unwrap();
        assert_eq!(
            backend
                .lookup(&refname("refs/heads/main"))
                .unwrap()
                .unwrap()
                .target,
            RefTarget::Direct(oid(2))
        );
    }

    #[test]
    fn test_rename_missing_reference_is_not_found() {
        let mut backend = MemoryRefdb::new();
        let err = backend
            .rename(&refname("refs/a"), &refname("refs/b"), false, None, None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_iteration_is_sorted_and_glob_filters() {
        let backend = setup();

        let mut all = backend.iterator(None).unwrap();
        let mut names = Vec::new();
        while let Some(reference) = all.next().unwrap() {
            names.push(reference.name.into_string());
        }
        assert_eq!(names, ["refs/heads/dev", "refs/heads/main", "refs/tags/v1"]);

        let mut heads = backend.iterator(Some("refs/heads/*")).unwrap();
        let mut names = Vec::new();
        while let Some(reference) = heads.next().unwrap() {
            names.push(reference.name.into_string());
        }
        assert_eq!(names, ["refs/heads/dev", "refs/heads/main"]);
    }

    #[test]
    fn test_compress_is_a_successful_no_op() {
        let mut backend = setup();
        backend.compress().unwrap();
        assert_eq!(backend.len(), 3);
    }
}
