//! in-memory configuration backend.

use crate::errors::{BackendError, BackendResult};

use super::backend::{ConfigBackend, ConfigEntry, ConfigLevel, ConfigOps};
use super::iterator::ConfigIterator;
use super::store::EntryStore;

/// Volatile configuration store, the reference backend for tests and the
/// harness.
///
/// Supports the full operation set. `lock` clones the committed entries
/// into a staging copy; mutations land there while reads keep seeing the
/// committed state, and `unlock` swaps the staging copy in. Snapshots are
/// frozen clones that reject every mutation.
#[derive(Debug, Clone)]
pub struct MemoryConfigBackend {
    entries: EntryStore,
    staged: Option<EntryStore>,
    level: ConfigLevel,
    frozen: bool,
}

impl MemoryConfigBackend {
    /// empty backend stamping its entries with `level`
    pub fn new(level: ConfigLevel) -> Self {
        Self {
            entries: EntryStore::new(),
            staged: None,
            level,
            frozen: false,
        }
    }

    /// backend preloaded with entries, for tests and the harness
    pub fn with_entries<I, K, V>(level: ConfigLevel, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut backend = Self::new(level);
        for (key, value) in entries {
            backend.entries.set(key.as_ref(), value.as_ref());
        }
        backend
    }

    /// number of stored values (committed state)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn write_target(&mut self) -> BackendResult<&mut EntryStore> {
        if self.frozen {
            return Err(BackendError::ReadOnly);
        }
        match self.staged.as_mut() {
            Some(staged) => Ok(staged),
            None => Ok(&mut self.entries),
        }
    }
}

impl Default for MemoryConfigBackend {
    fn default() -> Self {
        Self::new(ConfigLevel::Local)
    }
}

impl ConfigBackend for MemoryConfigBackend {
    type Value = String;
    type Iter = MemoryConfigIterator;

    fn supported_operations(&self) -> ConfigOps {
        ConfigOps::all()
    }

    fn open(&mut self, level: ConfigLevel) -> BackendResult<()> {
        // nothing to reload; remember the level for entries handed out
        self.level = level;
        Ok(())
    }

    fn get(&self, key: &str) -> BackendResult<Option<ConfigEntry<String>>> {
        Ok(self
            .entries
            .get(key)
            .map(|value| ConfigEntry::new(key, value.to_string(), self.level)))
    }

    fn set(&mut self, key: &str, value: &str) -> BackendResult<()> {
        self.write_target()?.set(key, value);
        Ok(())
    }

    fn set_multivar(&mut self, name: &str, pattern: &str, value: &str) -> BackendResult<()> {
        self.write_target()?.set_multivar(name, pattern, value)
    }

    fn del(&mut self, key: &str) -> BackendResult<()> {
        // removing an absent key is a successful no-op
        self.write_target()?.remove(key);
        Ok(())
    }

    fn del_multivar(&mut self, name: &str, pattern: &str) -> BackendResult<()> {
        self.write_target()?.del_multivar(name, pattern)
    }

    fn iterator(&self) -> BackendResult<MemoryConfigIterator> {
        Ok(MemoryConfigIterator::over(&self.entries, self.level))
    }

    fn snapshot(&self) -> BackendResult<Self> {
        Ok(Self {
            entries: self.entries.clone(),
            staged: None,
            level: self.level,
            frozen: true,
        })
    }

    fn lock(&mut self) -> BackendResult<()> {
        if self.frozen {
            return Err(BackendError::ReadOnly);
        }
        if self.staged.is_some() {
            return Err(BackendError::Locked);
        }
        self.staged = Some(self.entries.clone());
        Ok(())
    }

    fn unlock(&mut self) -> BackendResult<bool> {
        match self.staged.take() {
            Some(staged) => {
                self.entries = staged;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Forward cursor over a point-in-time copy of a store's entries.
///
/// Shared by the bundled backends; the copy is taken when the cursor is
/// created, so later mutations of the origin are invisible to it.
#[derive(Debug)]
pub struct MemoryConfigIterator {
    remaining: std::vec::IntoIter<ConfigEntry<String>>,
}

impl MemoryConfigIterator {
    pub(super) fn over(entries: &EntryStore, level: ConfigLevel) -> Self {
        Self {
            remaining: entries.entries_at(level).into_iter(),
        }
    }
}

impl ConfigIterator for MemoryConfigIterator {
    type Value = String;

    fn next(&mut self) -> BackendResult<Option<ConfigEntry<String>>> {
        Ok(self.remaining.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> MemoryConfigBackend {
        MemoryConfigBackend::with_entries(
            ConfigLevel::Local,
            [("core.bare", "true"), ("user.name", "alice")],
        )
    }

    #[test]
    fn test_get_set_del_round_trip() {
        let mut backend = setup();

        assert!(backend.get("user.email").unwrap().is_none());

        backend.set("user.email", "alice@example.com").unwrap();
        let entry = backend.get("user.email").unwrap().unwrap();
        assert_eq!(entry.name, "user.email");
        assert_eq!(entry.value, "alice@example.com");
        assert_eq!(entry.level, ConfigLevel::Local);

        backend.del("user.email").unwrap();
        assert!(backend.get("user.email").unwrap().is_none());

        // deleting again still succeeds
        backend.del("user.email").unwrap();
    }

    #[test]
    fn test_open_restamps_level() {
        let mut backend = setup();
        backend.open(ConfigLevel::System).unwrap();

        let entry = backend.get("core.bare").unwrap().unwrap();
        assert_eq!(entry.level, ConfigLevel::System);
    }

    #[test]
    fn test_snapshot_is_isolated_and_frozen() {
        let mut backend = setup();
        let mut frozen = backend.snapshot().unwrap();

        backend.set("core.bare", "false").unwrap();

        assert_eq!(frozen.get("core.bare").unwrap().unwrap().value, "true");
        assert_eq!(backend.get("core.bare").unwrap().unwrap().value, "false");

        assert!(matches!(
            frozen.set("core.bare", "illegal").unwrap_err(),
            BackendError::ReadOnly
        ));
        assert!(matches!(frozen.lock().unwrap_err(), BackendError::ReadOnly));
    }

    #[test]
    fn test_locked_writes_stay_invisible_until_unlock() {
        let mut backend = setup();

        backend.lock().unwrap();
        backend.set("core.bare", "false").unwrap();
        backend.set("new.key", "value").unwrap();

        // reads see the committed state
        assert_eq!(backend.get("core.bare").unwrap().unwrap().value, "true");
        assert!(backend.get("new.key").unwrap().is_none());

        assert!(backend.unlock().unwrap());
        assert_eq!(backend.get("core.bare").unwrap().unwrap().value, "false");
        assert_eq!(backend.get("new.key").unwrap().unwrap().value, "value");
    }

    #[test]
    fn test_unlock_without_lock_reports_nothing_committed() {
        let mut backend = setup();
        assert!(!backend.unlock().unwrap());
    }

    #[test]
    fn test_double_lock_is_rejected() {
        let mut backend = setup();
        backend.lock().unwrap();
        assert!(matches!(backend.lock().unwrap_err(), BackendError::Locked));
    }

    #[test]
    fn test_multivar_update_reaches_globbed_keys() {
        let mut backend = setup();
        backend.set_multivar("core.*", ".*", "x").unwrap();

        assert_eq!(backend.get("core.bare").unwrap().unwrap().value, "x");
        assert_eq!(backend.get("user.name").unwrap().unwrap().value, "alice");
    }

    #[test]
    fn test_iterator_is_sorted_and_exhaustion_is_terminal() {
        let backend = setup();
        let mut iter = backend.iterator().unwrap();

        assert_eq!(iter.next().unwrap().unwrap().name, "core.bare");
        assert_eq!(iter.next().unwrap().unwrap().name, "user.name");
        assert!(iter.next().unwrap().is_none());
        // terminal: keeps reporting exhaustion
        assert!(iter.next().unwrap().is_none());
    }

    #[test]
    fn test_iterator_ignores_later_mutations() {
        let mut backend = setup();
        let mut iter = backend.iterator().unwrap();
        backend.del("core.bare").unwrap();

        assert_eq!(iter.next().unwrap().unwrap().name, "core.bare");
    }
}
