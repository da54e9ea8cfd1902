//! shared entry storage for the bundled configuration backends.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::BackendResult;

use super::backend::{ConfigEntry, ConfigLevel};

/// Ordered key/values map with the multivar operations layered on top.
///
/// A key may carry several values (a multivar); `get` reads the most
/// recently added one, matching how layered config files shadow earlier
/// definitions. Iteration order is key order, then value insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryStore {
    entries: BTreeMap<String, Vec<String>>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// the effective (most recent) value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    /// replace all values of `key` with a single value
    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), vec![value.to_string()]);
    }

    /// remove a key entirely; returns whether it existed
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Update every value matching `pattern` under keys matching the
    /// `name` glob.
    ///
    /// When nothing matches and `name` carries no wildcard, the value is
    /// appended under `name` instead, which is how a caller adds to a
    /// multivar (a never-matching pattern plus a literal name).
    pub fn set_multivar(&mut self, name: &str, pattern: &str, value: &str) -> BackendResult<()> {
        let key_matcher = glob_regex(name)?;
        let value_matcher = Regex::new(pattern)?;

        let mut matched = false;
        for (key, values) in self.entries.iter_mut() {
            if !key_matcher.is_match(key) {
                continue;
            }
            for slot in values.iter_mut() {
                if value_matcher.is_match(slot) {
                    *slot = value.to_string();
                    matched = true;
                }
            }
        }

        if !matched && !name.contains('*') {
            self.entries
                .entry(name.to_string())
                .or_default()
                .push(value.to_string());
        }

        Ok(())
    }

    /// Remove every value matching `pattern` under keys matching the
    /// `name` glob. Keys left without values disappear.
    pub fn del_multivar(&mut self, name: &str, pattern: &str) -> BackendResult<()> {
        let key_matcher = glob_regex(name)?;
        let value_matcher = Regex::new(pattern)?;

        self.entries.retain(|key, values| {
            if key_matcher.is_match(key) {
                values.retain(|value| !value_matcher.is_match(value));
            }
            !values.is_empty()
        });

        Ok(())
    }

    /// all entries in iteration order, stamped with `level`
    pub fn entries_at(&self, level: ConfigLevel) -> Vec<ConfigEntry<String>> {
        self.entries
            .iter()
            .flat_map(|(key, values)| {
                values
                    .iter()
                    .map(|value| ConfigEntry::new(key.clone(), value.clone(), level))
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// translate a `*` glob into an anchored regex over whole keys
pub(super) fn glob_regex(glob: &str) -> BackendResult<Regex> {
    let parts: Vec<String> = glob.split('*').map(regex::escape).collect();
    let pattern = format!("^{}$", parts.join(".*"));
    Ok(Regex::new(&pattern)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> EntryStore {
        let mut store = EntryStore::new();
        store.set("core.bare", "true");
        store.set("core.ignorecase", "false");
        store.set("remote.origin.url", "https://example.com/repo");
        store
    }

    #[test]
    fn test_set_get_remove_round_trip() {
        let mut store = setup();
        assert_eq!(store.get("core.bare"), Some("true"));
        assert!(store.remove("core.bare"));
        assert_eq!(store.get("core.bare"), None);
        assert!(!store.remove("core.bare"));
    }

    #[test]
    fn test_get_reads_most_recent_value() {
        let mut store = EntryStore::new();
        // a never-matching pattern with a literal name appends
        store.set_multivar("remote.origin.fetch", "$^", "first").unwrap();
        store.set_multivar("remote.origin.fetch", "$^", "second").unwrap();

        assert_eq!(store.get("remote.origin.fetch"), Some("second"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_set_multivar_replaces_matching_values() {
        let mut store = setup();
        store.set_multivar("core.*", ".*", "x").unwrap();

        assert_eq!(store.get("core.bare"), Some("x"));
        assert_eq!(store.get("core.ignorecase"), Some("x"));
        // outside the glob, untouched
        assert_eq!(store.get("remote.origin.url"), Some("https://example.com/repo"));
    }

    #[test]
    fn test_set_multivar_value_pattern_narrows_the_update() {
        let mut store = setup();
        store.set_multivar("core.*", "^true$", "x").unwrap();

        assert_eq!(store.get("core.bare"), Some("x"));
        assert_eq!(store.get("core.ignorecase"), Some("false"));
    }

    #[test]
    fn test_set_multivar_wildcard_name_without_match_is_a_no_op() {
        let mut store = setup();
        store.set_multivar("branch.*", ".*", "x").unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("branch.*"), None);
    }

    #[test]
    fn test_del_multivar_drops_emptied_keys() {
        let mut store = EntryStore::new();
        store.set_multivar("remote.origin.fetch", "$^", "+refs/heads/*:refs/remotes/origin/*").unwrap();
        store.set_multivar("remote.origin.fetch", "$^", "+refs/tags/*:refs/tags/*").unwrap();

        store.del_multivar("remote.origin.fetch", "tags").unwrap();
        assert_eq!(store.len(), 1);

        store.del_multivar("remote.origin.fetch", ".*").unwrap();
        assert!(store.is_empty());
        assert_eq!(store.get("remote.origin.fetch"), None);
    }

    #[test]
    fn test_entries_sorted_and_stamped() {
        let store = setup();
        let entries = store.entries_at(ConfigLevel::Global);

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["core.bare", "core.ignorecase", "remote.origin.url"]);
        assert!(entries.iter().all(|e| e.level == ConfigLevel::Global));
    }

    #[test]
    fn test_glob_escapes_regex_metacharacters() {
        let matcher = glob_regex("core.*").unwrap();
        assert!(matcher.is_match("core.bare"));
        // the dot is literal, not "any character"
        assert!(!matcher.is_match("coreXbare"));

        let exact = glob_regex("core.bare").unwrap();
        assert!(exact.is_match("core.bare"));
        assert!(!exact.is_match("core.bareness"));

        let bad = glob_regex("core.(").unwrap();
        assert!(!bad.is_match("core.bare"));
    }
}
