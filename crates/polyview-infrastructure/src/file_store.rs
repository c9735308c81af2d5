//! JSON-file-backed key/value store.
//!
//! The whole store is one JSON object on disk. Every write rewrites the file
//! atomically (temporary file, fsync, rename) while holding an exclusive
//! `fs2` lock on a sibling `.lock` file, so a crash never leaves a torn file.

use crate::quota;
use polyview_core::error::Result;
use polyview_core::store::{KeyValueStore, StoreError};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Persistent [`KeyValueStore`] with a byte quota.
///
/// Values are cached in memory; reads never touch the disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    quota: usize,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Opens the store at `path`, creating nothing until the first write.
    ///
    /// An unreadable file is logged and treated as empty; the next write
    /// replaces it.
    pub fn open(path: impl Into<PathBuf>, quota: usize) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "Store file is corrupt, starting empty"
                    );
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), keys = entries.len(), "Opened store");
        Ok(Self {
            path,
            quota,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
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
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let _lock = FileLock::acquire(&self.path)?;

        let json = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)
    }

    fn temp_path(&self) -> std::io::Result<PathBuf> {
        let file_name = self.path.file_name().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "store path has no file name")
        })?;
        let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
        Ok(self.path.with_file_name(tmp_name))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
        let mut entries = self.lock();
        quota::check(&entries, key, value, self.quota)?;

        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(err) = self.persist(&entries) {
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(StoreError::Io(err.to_string()));
        }
        Ok(())
    }

    fn remove(&self, key: &str) {
        let mut entries = self.lock();
        let Some(previous) = entries.remove(key) else {
            return;
        };
        if let Err(err) = self.persist(&entries) {
            warn!(key, error = %err, "Failed to persist removal, keeping entry");
            entries.insert(key.to_string(), previous);
        }
    }
}

/// Exclusive lock on `<store>.lock`, released on drop.
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(path: &Path) -> std::io::Result<Self> {
        let lock_path = path.with_extension("lock");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()?;
        }

        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use fs2::FileExt;
            let _ = self.file.unlock();
        }
    }
}
