//! file-backed configuration backend.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{BackendError, BackendResult};

use super::backend::{ConfigBackend, ConfigEntry, ConfigLevel, ConfigOps};
use super::memory::MemoryConfigIterator;
use super::store::EntryStore;

const FORMAT_VERSION: u32 = 1;

/// on-disk shape: a format tag plus the entry map
#[derive(Debug, Serialize, Deserialize)]
struct Document {
    _format: u32,
    entries: EntryStore,
}

/// Configuration store persisted as a JSON document.
///
/// Outside a lock every mutation is written through to disk immediately.
/// `lock` switches to a staging copy so the whole critical section lands
/// in one write on `unlock`. `open` re-reads the file, picking up changes
/// made by other handles.
#[derive(Debug)]
pub struct FileConfigBackend {
    path: PathBuf,
    level: ConfigLevel,
    entries: EntryStore,
    staged: Option<EntryStore>,
    frozen: bool,
}

impl FileConfigBackend {
    /// Open the store at `path`, creating an empty one if the file does
    /// not exist yet. Entries are stamped with `level`.
    pub fn open_path(path: impl Into<PathBuf>, level: ConfigLevel) -> BackendResult<Self> {
        let path = path.into();
        let entries = Self::load(&path)?;
        Ok(Self {
            path,
            level,
            entries,
            staged: None,
            frozen: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> BackendResult<EntryStore> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(EntryStore::new());
            }
            Err(err) => return Err(err.into()),
        };

        let document: Document = serde_json::from_str(&raw)?;
        if document._format != FORMAT_VERSION {
            return Err(BackendError::Message(format!(
                "unsupported config document format {} in {}",
                document._format,
                path.display()
            )));
        }
        Ok(document.entries)
    }

    fn persist(&self) -> BackendResult<()> {
        let document = Document {
            _format: FORMAT_VERSION,
            entries: self.entries.clone(),
        };
        let raw = serde_json::to_string_pretty(&document)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    fn write_with(
        &mut self,
        apply: impl FnOnce(&mut EntryStore) -> BackendResult<()>,
    ) -> BackendResult<()> {
        if self.frozen {
            return Err(BackendError::ReadOnly);
        }
        match self.staged.as_mut() {
            Some(staged) => apply(staged),
            None => {
                apply(&mut self.entries)?;
                self.persist()
            }
        }
    }
}

impl ConfigBackend for FileConfigBackend {
    type Value = String;
    type Iter = MemoryConfigIterator;

    fn supported_operations(&self) -> ConfigOps {
        ConfigOps::all()
    }

    fn open(&mut self, level: ConfigLevel) -> BackendResult<()> {
        self.entries = Self::load(&self.path)?;
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
        self.write_with(|store| {
            store.set(key, value);
            Ok(())
        })
    }

    fn set_multivar(&mut self, name: &str, pattern: &str, value: &str) -> BackendResult<()> {
        self.write_with(|store| store.set_multivar(name, pattern, value))
    }

    fn del(&mut self, key: &str) -> BackendResult<()> {
        self.write_with(|store| {
            store.remove(key);
            Ok(())
        })
    }

    fn del_multivar(&mut self, name: &str, pattern: &str) -> BackendResult<()> {
        self.write_with(|store| store.del_multivar(name, pattern))
    }

    fn iterator(&self) -> BackendResult<MemoryConfigIterator> {
        Ok(MemoryConfigIterator::over(&self.entries, self.level))
    }

    fn snapshot(&self) -> BackendResult<Self> {
        Ok(Self {
            path: self.path.clone(),
            level: self.level,
            entries: self.entries.clone(),
            staged: None,
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
                self.persist()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
