//! the configuration backend contract.

use std::fmt;

use crate::errors::{BackendError, BackendResult};

use super::iterator::ConfigIterator;

bitflags::bitflags! {
    /// The set of optional operations a configuration backend implements.
    ///
    /// Declared once per backend through
    /// [`ConfigBackend::supported_operations`]; every flag left out of the
    /// set leaves the matching table slot NULL so native code can feature
    /// detect. There is deliberately no `Default` — a backend must state
    /// what it supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConfigOps: u32 {
        /// reload state for a configuration level
        const OPEN = 1 << 0;
        /// single-value lookup
        const GET = 1 << 1;
        /// single-value store
        const SET = 1 << 2;
        /// matched update of multi-valued keys
        const SET_MULTIVAR = 1 << 3;
        /// single-key removal
        const DEL = 1 << 4;
        /// matched removal of multi-valued keys
        const DEL_MULTIVAR = 1 << 5;
        /// entry iteration
        const ITERATOR = 1 << 6;
        /// frozen point-in-time copies
        const SNAPSHOT = 1 << 7;
        /// begin a buffered critical section
        const LOCK = 1 << 8;
        /// end a buffered critical section
        const UNLOCK = 1 << 9;
        /// release the backend; the exported slot is populated regardless
        const FREE = 1 << 10;
    }
}

/// Which configuration scope an entry belongs to.
///
/// The discriminants match the native core's level enumeration and travel
/// across the boundary as plain integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum ConfigLevel {
    /// system-wide on Windows, for compatibility with portable git
    ProgramData = 1,
    /// system-wide configuration
    System = 2,
    /// XDG-compatible user configuration
    Xdg = 3,
    /// user home configuration
    Global = 4,
    /// repository-specific configuration
    Local = 5,
    /// worktree-specific configuration
    Worktree = 6,
}

impl ConfigLevel {
    /// decode a level from its native integer form
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::ProgramData),
            2 => Some(Self::System),
            3 => Some(Self::Xdg),
            4 => Some(Self::Global),
            5 => Some(Self::Local),
            6 => Some(Self::Worktree),
            _ => None,
        }
    }

    /// the native integer form
    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ConfigLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProgramData => "programdata",
            Self::System => "system",
            Self::Xdg => "xdg",
            Self::Global => "global",
            Self::Local => "local",
            Self::Worktree => "worktree",
        };
        write!(f, "{name}")
    }
}

/// One configuration entry as a backend reports it.
///
/// `V` is the backend's value representation; anything `Display` works,
/// since the boundary renders values to text on the way out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry<V> {
    pub name: String,
    pub value: V,
    pub level: ConfigLevel,
}

impl<V> ConfigEntry<V> {
    pub fn new(name: impl Into<String>, value: V, level: ConfigLevel) -> Self {
        Self {
            name: name.into(),
            value,
            level,
        }
    }
}

/// A host-supplied configuration store.
///
/// Implement this and hand the instance to
/// [`export_backend`](super::export_backend) to let the native core drive
/// it. Every operation except [`supported_operations`] has
/// a default body returning [`BackendError::Unsupported`], matching the
/// table contract for backends that declare a partial capability set: the
/// slot stays NULL, and a call that arrives anyway fails cleanly.
///
/// Contracts the core relies on:
/// - `get` reports an absent key as `Ok(None)`, never as an error
/// - `open` is idempotent for a given level
/// - `snapshot` returns a frozen copy that ignores later mutations
/// - `lock`/`unlock` bracket an exclusive section; `unlock` reports
///   whether buffered writes were committed
///
/// [`supported_operations`]: ConfigBackend::supported_operations
pub trait ConfigBackend: Send + 'static {
    /// the backend's value representation
    type Value: fmt::Display;
    /// the cursor type handed out by [`iterator`](ConfigBackend::iterator)
    type Iter: ConfigIterator<Value = Self::Value>;

    /// The operations this backend implements.
    ///
    /// Required: the exported table populates exactly these slots.
    fn supported_operations(&self) -> ConfigOps;

    /// reload backing data for the given level
    fn open(&mut self, level: ConfigLevel) -> BackendResult<()> {
        let _ = level;
        Err(BackendError::Unsupported("open"))
    }

    /// look up the current value of `key`; absent keys are `Ok(None)`
    fn get(&self, key: &str) -> BackendResult<Option<ConfigEntry<Self::Value>>> {
        let _ = key;
        Err(BackendError::Unsupported("get"))
    }

    /// store `value` under `key`, replacing any previous value
    fn set(&mut self, key: &str, value: &str) -> BackendResult<()> {
        let _ = (key, value);
        Err(BackendError::Unsupported("set"))
    }

    /// Update every value matching `pattern` under keys matching `name`.
    ///
    /// Matching policy belongs to the backend; the bundled stores treat
    /// `name` as a `*` glob over keys and `pattern` as a regular
    /// expression over values.
    fn set_multivar(&mut self, name: &str, pattern: &str, value: &str) -> BackendResult<()> {
        let _ = (name, pattern, value);
        Err(BackendError::Unsupported("set_multivar"))
    }

    /// remove `key`; removing an absent key is backend-defined
    fn del(&mut self, key: &str) -> BackendResult<()> {
        let _ = key;
        Err(BackendError::Unsupported("del"))
    }

    /// remove every value matching `pattern` under keys matching `name`
    fn del_multivar(&mut self, name: &str, pattern: &str) -> BackendResult<()> {
        let _ = (name, pattern);
        Err(BackendError::Unsupported("del_multivar"))
    }

    /// a fresh forward-only cursor over the current entries
    fn iterator(&self) -> BackendResult<Self::Iter> {
        Err(BackendError::Unsupported("iterator"))
    }

    /// a frozen point-in-time copy of the current entries
    fn snapshot(&self) -> BackendResult<Self>
    where
        Self: Sized,
    {
        Err(BackendError::Unsupported("snapshot"))
    }

    /// begin buffering writes until [`unlock`](ConfigBackend::unlock)
    fn lock(&mut self) -> BackendResult<()> {
        Err(BackendError::Unsupported("lock"))
    }

    /// End the buffered section.
    ///
    /// Returns true when buffered writes were committed, false when there
    /// was no section to commit.
    fn unlock(&mut self) -> BackendResult<bool> {
        Err(BackendError::Unsupported("unlock"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct GetOnly;

    impl ConfigBackend for GetOnly {
        type Value = String;
        type Iter = crate::config::MemoryConfigIterator;

        fn supported_operations(&self) -> ConfigOps {
            ConfigOps::GET | ConfigOps::FREE
        }

        fn get(&self, key: &str) -> BackendResult<Option<ConfigEntry<String>>> {
            Ok(Some(ConfigEntry::new(key, "fixed".to_string(), ConfigLevel::Local)))
        }
    }

    #[test]
    fn test_level_raw_round_trip() {
        for raw in 1..=6u32 {
            let level = ConfigLevel::from_raw(raw).unwrap();
            assert_eq!(level.as_raw(), raw);
        }
        assert!(ConfigLevel::from_raw(0).is_none());
        assert!(ConfigLevel::from_raw(7).is_none());
    }

    #[test]
    fn test_capability_bit_values() {
        assert_eq!(ConfigOps::OPEN.bits(), 1);
        assert_eq!(ConfigOps::GET.bits(), 2);
        assert_eq!(ConfigOps::SET.bits(), 4);
        assert_eq!(ConfigOps::SET_MULTIVAR.bits(), 8);
        assert_eq!(ConfigOps::DEL.bits(), 16);
        assert_eq!(ConfigOps::DEL_MULTIVAR.bits(), 32);
        assert_eq!(ConfigOps::ITERATOR.bits(), 64);
        assert_eq!(ConfigOps::SNAPSHOT.bits(), 128);
        assert_eq!(ConfigOps::LOCK.bits(), 256);
        assert_eq!(ConfigOps::UNLOCK.bits(), 512);
        assert_eq!(ConfigOps::FREE.bits(), 1024);
    }

    #[test]
    fn test_default_bodies_report_unsupported() {
        let mut backend = GetOnly;
        assert!(backend.get("any.key").unwrap().is_some());

        let err = backend.set("any.key", "value").unwrap_err();
        assert!(err.is_unsupported());
        assert!(backend.lock().unwrap_err().is_unsupported());
        assert!(backend.iterator().unwrap_err().is_unsupported());
    }
}
