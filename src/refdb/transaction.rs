//! queued reference updates applied atomically-ish on commit.
//!
//! The transaction borrows the backend exclusively, so nothing else can
//! touch the store while updates are queued. Each locked name records the
//! value it had at lock time, and commit passes that value back as the
//! compare-and-swap expectation, so a backend with external writers (a
//! file store shared between processes, say) still gets a meaningful
//! precondition on every write.

use crate::errors::{BackendError, BackendResult};
use crate::types::{ObjectId, RefName, Signature};

use super::backend::{RefTarget, Reference, RefdbBackend};

enum QueuedUpdate {
    SetDirect {
        target: ObjectId,
        message: Option<String>,
    },
    SetSymbolic {
        target: RefName,
        message: Option<String>,
    },
    Remove,
}

struct LockedRef {
    name: RefName,
    /// value at lock time, used as the commit-time expectation
    expected: RefTarget,
    update: Option<QueuedUpdate>,
}

/// A set of reference updates that land together on [`commit`] and are
/// discarded when the transaction is dropped without committing.
///
/// Every name must be locked with [`lock_reference`] before an update can
/// be queued for it. Updates apply in lock order.
///
/// [`commit`]: RefTransaction::commit
/// [`lock_reference`]: RefTransaction::lock_reference
pub struct RefTransaction<'a, B: RefdbBackend> {
    backend: &'a mut B,
    signature: Signature,
    locked: Vec<LockedRef>,
}

impl<'a, B: RefdbBackend> RefTransaction<'a, B> {
    /// start a transaction; `signature` is recorded on every update
    pub fn new(backend: &'a mut B, signature: Signature) -> Self {
        Self {
            backend,
            signature,
            locked: Vec::new(),
        }
    }

    /// Lock `name` for update, recording its current value.
    ///
    /// A name that does not exist cannot be locked, and a name can only
    /// be locked once per transaction.
    pub fn lock_reference(&mut self, name: &RefName) -> BackendResult<()> {
        if self.position_of(name).is_some() {
            return Err(BackendError::Locked);
        }
        let Some(current) = self.backend.lookup(name)? else {
            return Err(BackendError::NotFound(format!(
                "reference '{name}' not found"
            )));
        };
        self.locked.push(LockedRef {
            name: name.clone(),
            expected: current.target,
            update: None,
        });
        Ok(())
    }

    /// queue a direct-target update for a locked name
    pub fn set_target(
        &mut self,
        name: &RefName,
        target: ObjectId,
        message: Option<&str>,
    ) -> BackendResult<()> {
        let entry = self.locked_entry(name)?;
        entry.update = Some(QueuedUpdate::SetDirect {
            target,
            message: message.map(str::to_string),
        });
        Ok(())
    }

    /// queue a symbolic-target update for a locked name
    pub fn set_symbolic_target(
        &mut self,
        name: &RefName,
        target: RefName,
        message: Option<&str>,
    ) -> BackendResult<()> {
        let entry = self.locked_entry(name)?;
        entry.update = Some(QueuedUpdate::SetSymbolic {
            target,
            message: message.map(str::to_string),
        });
        Ok(())
    }

    /// queue removal of a locked name
    pub fn remove(&mut self, name: &RefName) -> BackendResult<()> {
        let entry = self.locked_entry(name)?;
        entry.update = Some(QueuedUpdate::Remove);
        Ok(())
    }

    /// Apply the queued updates in lock order.
    ///
    /// Each write carries the lock-time value as its expected old value;
    /// locked names without a queued update are left untouched.
    pub fn commit(self) -> BackendResult<()> {
        for entry in self.locked {
            let Some(update) = entry.update else {
                continue;
            };

            let (old_id, old_target) = match &entry.expected {
                RefTarget::Direct(id) => (Some(id), None),
                RefTarget::Symbolic(target) => (None, Some(target)),
            };

            match update {
                QueuedUpdate::SetDirect { target, message } => {
                    self.backend.write(
                        &Reference::direct(entry.name.clone(), target),
                        true,
                        Some(&self.signature),
                        message.as_deref(),
                        old_id,
                        old_target,
                    )?;
                }
                QueuedUpdate::SetSymbolic { target, message } => {
                    self.backend.write(
                        &Reference::symbolic(entry.name.clone(), target),
                        true,
                        Some(&self.signature),
                        message.as_deref(),
                        old_id,
                        old_target,
                    )?;
                }
                QueuedUpdate::Remove => {
                    self.backend.delete(&entry.name, old_id, old_target)?;
                }
            }
        }
        Ok(())
    }

    fn position_of(&self, name: &RefName) -> Option<usize> {
        self.locked.iter().position(|entry| &entry.name == name)
    }

    fn locked_entry(&mut self, name: &RefName) -> BackendResult<&mut LockedRef> {
        match self.position_of(name) {
            Some(index) => Ok(&mut self.locked[index]),
            None => Err(BackendError::NotFound(format!(
                "reference '{name}' is not locked by this transaction"
            ))),
        }
    }
}
