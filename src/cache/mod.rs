//! Local cache of checked-out credentials.
//!
//! Entries are keyed by profile identity and checkout mode. The cache does
//! not judge expiry: `get` hands back whatever is stored so callers can tell
//! "present but stale" apart from "absent" (see [`Freshness`]).

mod encrypted;
mod memory;

pub use encrypted::{EncryptedFileCache, DEFAULT_WORK_FACTOR, FORMAT_TAG, MAX_WORK_FACTOR};
pub use memory::MemoryCache;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::credentials::{CredentialRecord, Mode, ProfileId};
use crate::error::Result;

/// Storage for credential records.
pub trait SecretCache: Send + Sync {
    /// Look up the record for an identity, expired or not.
    ///
    /// A missing backing store is an empty cache, not an error.
    fn get(&self, profile: &ProfileId, mode: Mode) -> Result<Option<CredentialRecord>>;

    /// Store a record, replacing any prior record for the same identity.
    fn put(&self, profile: &ProfileId, mode: Mode, record: &CredentialRecord) -> Result<()>;

    /// Drop one identity. Returns whether anything was removed.
    fn remove(&self, profile: &ProfileId, mode: Mode) -> Result<bool>;
}

/// Outcome of a cache lookup judged against the clock.
#[derive(Debug, Clone, PartialEq)]
pub enum Freshness {
    Fresh(CredentialRecord),
    Expired(CredentialRecord),
    Missing,
}

impl Freshness {
    pub fn judge(record: Option<CredentialRecord>, clock: &dyn Clock) -> Self {
        match record {
            Some(record) if record.is_valid_at(clock) => Freshness::Fresh(record),
            Some(record) => Freshness::Expired(record),
            None => Freshness::Missing,
        }
    }
}

pub(crate) fn entry_key(profile: &ProfileId, mode: Mode) -> String {
    format!("{}|{}", mode, profile.key())
}

/// Plaintext document held inside the encrypted cache file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct CacheDocument {
    #[serde(default)]
    pub entries: BTreeMap<String, CredentialRecord>,
}
