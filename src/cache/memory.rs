use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{entry_key, SecretCache};
use crate::credentials::{CredentialRecord, Mode, ProfileId};
use crate::error::Result;

/// In-memory cache, for tests and callers that do not want anything on disk.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CredentialRecord>>,
    writes: Mutex<usize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put` calls so far.
    pub fn write_count(&self) -> usize {
        *lock(&self.writes)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SecretCache for MemoryCache {
    fn get(&self, profile: &ProfileId, mode: Mode) -> Result<Option<CredentialRecord>> {
        Ok(lock(&self.entries).get(&entry_key(profile, mode)).cloned())
    }

    fn put(&self, profile: &ProfileId, mode: Mode, record: &CredentialRecord) -> Result<()> {
        lock(&self.entries).insert(entry_key(profile, mode), record.clone());
        *lock(&self.writes) += 1;
        Ok(())
    }

    fn remove(&self, profile: &ProfileId, mode: Mode) -> Result<bool> {
        Ok(lock(&self.entries)
            .remove(&entry_key(profile, mode))
            .is_some())
    }
}
