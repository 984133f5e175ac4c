//! Per-operator scoped persister
//!
//! Source emission paths cannot tolerate per-write disk I/O, so the
//! persister keeps the scope in memory and flushes dirty keys in one
//! batch on `sync`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::database::Database;
use crate::error::Result;

#[cfg(test)]
#[path = "scoped_test.rs"]
mod tests;

/// Separator between the scope prefix and the caller's key
const SCOPE_SEPARATOR: u8 = b'~';

/// A view of the offset database scoped to one operator
///
/// All keys are transparently prefixed with `<scope>~`. `get` and `set`
/// operate on an in-memory cache guarded by a mutex, so they are safe
/// against a concurrent `sync`.
pub struct ScopedPersister {
    database: Arc<dyn Database>,
    prefix: Vec<u8>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    cache: BTreeMap<Vec<u8>, Vec<u8>>,
    dirty: BTreeSet<Vec<u8>>,
}

impl ScopedPersister {
    /// Create a persister scoped to the operator's namespaced id
    pub fn new(database: Arc<dyn Database>, scope: &str) -> Self {
        let mut prefix = scope.as_bytes().to_vec();
        prefix.push(SCOPE_SEPARATOR);
        Self {
            database,
            prefix,
            state: Mutex::new(State::default()),
        }
    }

    /// Load every key under this scope into the in-memory cache
    ///
    /// Called once from the owning source's `start`. Unsynced in-memory
    /// writes are discarded in favor of the stored state.
    pub fn load(&self) -> Result<()> {
        let pairs = self.database.scan_prefix(&self.prefix)?;
        let mut state = self.state.lock();
        state.cache.clear();
        state.dirty.clear();
        for (k, v) in pairs {
            state.cache.insert(k[self.prefix.len()..].to_vec(), v);
        }
        Ok(())
    }

    /// Read a key from the cache; `None` if absent
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.state.lock().cache.get(key).cloned()
    }

    /// Write a key to the cache and mark it dirty
    pub fn set(&self, key: &[u8], value: Vec<u8>) {
        let mut state = self.state.lock();
        state.cache.insert(key.to_vec(), value);
        state.dirty.insert(key.to_vec());
    }

    /// The keys currently present in the cache
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.state.lock().cache.keys().cloned().collect()
    }

    /// Flush dirty keys to the database in a single batch
    ///
    /// The dirty set is cleared only after the batch and the database
    /// sync both succeed, so a failed sync retries the same keys.
    pub fn sync(&self) -> Result<()> {
        let pending: Vec<(Vec<u8>, Vec<u8>)> = {
            let state = self.state.lock();
            state
                .dirty
                .iter()
                .filter_map(|k| {
                    state.cache.get(k).map(|v| {
                        let mut full = self.prefix.clone();
                        full.extend_from_slice(k);
                        (full, v.clone())
                    })
                })
                .collect()
        };

        if pending.is_empty() {
            return Ok(());
        }

        self.database.write_batch(pending)?;
        self.database.sync()?;
        self.state.lock().dirty.clear();
        Ok(())
    }

    /// Sync, then drop the database reference
    pub fn close(&self) -> Result<()> {
        self.sync()
    }
}
