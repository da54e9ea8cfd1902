//! the configuration iterator contract.

use std::fmt;

use crate::errors::BackendResult;

use super::backend::ConfigEntry;

/// A forward-only cursor over configuration entries.
///
/// One cursor pairs with one backend or snapshot. `Ok(None)` signals
/// exhaustion and is terminal: once returned, every later call must keep
/// returning it. The boundary maps it to the iteration-exhausted status
/// code without recording an error.
pub trait ConfigIterator: Send + 'static {
    type Value: fmt::Display;

    /// advance and return the next entry, or `Ok(None)` when exhausted
    fn next(&mut self) -> BackendResult<Option<ConfigEntry<Self::Value>>>;
}
