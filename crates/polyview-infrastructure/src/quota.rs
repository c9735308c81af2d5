//! Byte accounting shared by the store adapters.
//!
//! Usage is the UTF-8 length of every key plus every value, which is what a
//! browser-style storage quota charges.

use polyview_core::store::StoreError;
use std::collections::BTreeMap;

pub(crate) fn usage(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

/// Fails with `QuotaExceeded` if replacing `key` with `value` would exceed
/// `quota`.
pub(crate) fn check(
    entries: &BTreeMap<String, String>,
    key: &str,
    value: &str,
    quota: usize,
) -> Result<(), StoreError> {
    let current = usage(entries);
    let replaced = entries.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
    let needed = current - replaced + key.len() + value.len();
    if needed > quota {
        return Err(StoreError::QuotaExceeded {
            key: key.to_string(),
            needed,
            quota,
        });
    }
    Ok(())
}
