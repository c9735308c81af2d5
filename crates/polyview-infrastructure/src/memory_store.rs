use crate::quota;
use polyview_core::store::{KeyValueStore, StoreError};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Volatile [`KeyValueStore`] with a byte quota.
///
/// Used by tests and by hosts that keep state elsewhere.
#[derive(Debug)]
pub struct InMemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota: usize,
}

impl InMemoryStore {
    pub fn new(quota: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota,
        }
    }

    /// A store that never reports quota errors.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Bytes currently charged against the quota.
    pub fn usage(&self) -> usize {
        quota::usage(&self.lock())
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        // A poisoned map is still structurally valid.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.lock();
        quota::check(&entries, key, value, self.quota)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.lock().remove(key);
    }
}
