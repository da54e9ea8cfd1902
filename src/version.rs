//! build and wire-contract version reporting.

use std::fmt;

use crate::raw::config::CONFIG_BACKEND_VERSION;
use crate::raw::refdb::REFDB_BACKEND_VERSION;

/// Versions a host can probe before installing backends.
///
/// The table versions are wire contracts: a table whose `version` field
/// does not match what the native core expects is rejected at install
/// time, before any slot is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    /// crate version from the build
    pub crate_version: &'static str,
    /// layout revision of the config operation table
    pub config_table: u32,
    /// layout revision of the refdb operation table
    pub refdb_table: u32,
}

impl Version {
    pub fn current() -> Self {
        Self {
            crate_version: env!("CARGO_PKG_VERSION"),
            config_table: CONFIG_BACKEND_VERSION,
            refdb_table: REFDB_BACKEND_VERSION,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gitbridge {} (config table v{}, refdb table v{})",
            self.crate_version, self.config_table, self.refdb_table
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_matches_table_revisions() {
        let version = Version::current();
        assert_eq!(version.config_table, CONFIG_BACKEND_VERSION);
        assert_eq!(version.refdb_table, REFDB_BACKEND_VERSION);
        assert!(!version.crate_version.is_empty());
    }

    #[test]
    fn test_display_names_both_tables() {
        let rendered = Version::current().to_string();
        assert!(rendered.starts_with("gitbridge "));
        assert!(rendered.contains("config table v1"));
        assert!(rendered.contains("refdb table v1"));
    }
}
