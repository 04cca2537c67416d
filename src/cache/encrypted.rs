use std::io;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::{entry_key, CacheDocument, SecretCache};
use crate::atomic;
use crate::credentials::{CredentialRecord, Mode, ProfileId};
use crate::error::{Error, Result};

/// First line of every cache file. Bump when the payload layout changes.
pub const FORMAT_TAG: &str = "credbroker-cache v1";

const TAG_PREFIX: &str = "credbroker-cache ";

/// scrypt work factor (log2 N) used unless configured otherwise.
///
/// The exec plugin decrypts the cache on every kubectl call, so unlocking
/// must take milliseconds. At 2^12 that is a few ms on current hardware.
pub const DEFAULT_WORK_FACTOR: u8 = 12;

/// Highest work factor accepted when decrypting. Files written with any
/// configured factor up to this still open after the setting changes.
pub const MAX_WORK_FACTOR: u8 = 22;

/// Passphrase-encrypted cache stored as a single file.
///
/// Layout:
/// ```text
/// credbroker-cache v1\n
/// <age ciphertext: scrypt-wrapped file key, salt in the age header>
/// ```
///
/// The plaintext is a JSON [`CacheDocument`]. Every write re-encrypts the
/// whole document and atomically replaces the file.
pub struct EncryptedFileCache {
    path: PathBuf,
    passphrase: SecretString,
    work_factor: u8,
}

impl EncryptedFileCache {
    pub fn new(path: impl AsRef<Path>, passphrase: SecretString) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            passphrase,
            work_factor: DEFAULT_WORK_FACTOR,
        }
    }

    /// Override the scrypt work factor (log2 N) for writes. `None` keeps
    /// [`DEFAULT_WORK_FACTOR`].
    pub fn with_work_factor(mut self, log_n: Option<u8>) -> Self {
        self.work_factor = log_n.unwrap_or(DEFAULT_WORK_FACTOR);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the cache file. Only ever done on explicit user request.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(Error::CacheWriteFailed {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn secret(&self) -> SecretString {
        SecretString::from(self.passphrase.expose_secret().to_owned())
    }

    fn unreadable(&self, reason: impl Into<String>) -> Error {
        Error::CacheUnreadable {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn load(&self) -> Result<CacheDocument> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No credential cache yet");
                return Ok(CacheDocument::default());
            }
            Err(source) => {
                return Err(Error::CacheIo {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let ciphertext = self.strip_tag(&bytes)?;
        let mut identity = age::scrypt::Identity::new(self.secret());
        identity.set_max_work_factor(MAX_WORK_FACTOR.max(self.work_factor));
        let plaintext =
            age::decrypt(&identity, ciphertext).map_err(|e| self.unreadable(e.to_string()))?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| self.unreadable(format!("decrypted payload is not a cache document: {e}")))
    }

    fn strip_tag<'a>(&self, bytes: &'a [u8]) -> Result<&'a [u8]> {
        let newline = bytes
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| self.unreadable("missing format tag"))?;
        let tag = std::str::from_utf8(&bytes[..newline])
            .map_err(|_| self.unreadable("missing format tag"))?;

        if tag == FORMAT_TAG {
            Ok(&bytes[newline + 1..])
        } else if tag.starts_with(TAG_PREFIX) {
            Err(Error::UnsupportedCacheVersion {
                path: self.path.clone(),
                found: tag.to_string(),
            })
        } else {
            Err(self.unreadable("not a credbroker cache file"))
        }
    }

    fn store(&self, document: &CacheDocument) -> Result<()> {
        let write_failed = |source: io::Error| Error::CacheWriteFailed {
            path: self.path.clone(),
            source,
        };

        let plaintext = serde_json::to_vec(document).map_err(|e| Error::Serialization {
            what: "credential cache",
            reason: e.to_string(),
        })?;

        let mut recipient = age::scrypt::Recipient::new(self.secret());
        recipient.set_work_factor(self.work_factor);
        let ciphertext = age::encrypt(&recipient, &plaintext)
            .map_err(|e| write_failed(io::Error::other(e.to_string())))?;

        let mut contents = Vec::with_capacity(FORMAT_TAG.len() + 1 + ciphertext.len());
        contents.extend_from_slice(FORMAT_TAG.as_bytes());
        contents.push(b'\n');
        contents.extend_from_slice(&ciphertext);

        atomic::write_private(&self.path, &contents).map_err(write_failed)
    }
}

impl SecretCache for EncryptedFileCache {
    fn get(&self, profile: &ProfileId, mode: Mode) -> Result<Option<CredentialRecord>> {
        let mut document = self.load()?;
        Ok(document.entries.remove(&entry_key(profile, mode)))
    }

    fn put(&self, profile: &ProfileId, mode: Mode, record: &CredentialRecord) -> Result<()> {
        // An unreadable file is reported, never overwritten with a fresh
        // document that would silently drop the other entries.
        let mut document = self.load()?;
        document
            .entries
            .insert(entry_key(profile, mode), record.clone());
        self.store(&document)?;
        debug!(%profile, %mode, path = %self.path.display(), "Stored credential");
        Ok(())
    }

    fn remove(&self, profile: &ProfileId, mode: Mode) -> Result<bool> {
        let mut document = self.load()?;
        if document.entries.remove(&entry_key(profile, mode)).is_none() {
            return Ok(false);
        }
        self.store(&document)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn cache(dir: &TempDir, passphrase: &str) -> EncryptedFileCache {
        EncryptedFileCache::new(dir.path().join("t1.cache"), SecretString::from(passphrase))
            .with_work_factor(Some(10))
    }

    fn record() -> CredentialRecord {
        CredentialRecord::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
            .with_field("token", "tok-123")
    }

    #[test]
    fn test_missing_file_is_empty() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let profile = ProfileId::new("AWS", "Prod", "Admin");
        assert!(cache(&dir, "pw").get(&profile, Mode::KubeExec)?.is_none());
        Ok(())
    }

    #[test]
    fn test_file_holds_no_plaintext() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = cache(&dir, "correct horse battery staple");
        store.put(&ProfileId::new("AWS", "Prod", "Admin"), Mode::KubeExec, &record())?;

        let raw = std::fs::read(store.path())?;
        assert!(raw.starts_with(b"credbroker-cache v1\n"));
        let text = String::from_utf8_lossy(&raw);
        assert!(!text.contains("tok-123"));
        assert!(!text.contains("horse battery"));
        Ok(())
    }

    #[test]
    fn test_put_replaces_and_keeps_other_entries() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = cache(&dir, "pw");
        let admin = ProfileId::new("AWS", "Prod", "Admin");
        let viewer = ProfileId::new("AWS", "Prod", "Viewer");

        store.put(&admin, Mode::KubeExec, &record())?;
        store.put(&viewer, Mode::KubeExec, &record())?;
        let newer = record().with_field("token", "tok-456");
        store.put(&admin, Mode::KubeExec, &newer)?;

        assert_eq!(store.get(&admin, Mode::KubeExec)?, Some(newer));
        assert_eq!(store.get(&viewer, Mode::KubeExec)?, Some(record()));
        assert!(store.get(&admin, Mode::Interactive)?.is_none());
        Ok(())
    }

    #[test]
    fn test_remove_and_clear() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = cache(&dir, "pw");
        let admin = ProfileId::new("AWS", "Prod", "Admin");

        assert!(!store.remove(&admin, Mode::KubeExec)?);
        store.put(&admin, Mode::KubeExec, &record())?;
        assert!(store.remove(&admin, Mode::KubeExec)?);
        assert!(store.get(&admin, Mode::KubeExec)?.is_none());

        assert!(store.clear()?);
        assert!(!store.clear()?);
        Ok(())
    }

    fn scrypt_log_n(raw: &[u8]) -> Option<u8> {
        String::from_utf8_lossy(raw)
            .lines()
            .find(|line| line.starts_with("-> scrypt "))
            .and_then(|line| line.split(' ').last())
            .and_then(|n| n.parse().ok())
    }

    #[test]
    fn test_default_work_factor_round_trips() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = EncryptedFileCache::new(dir.path().join("t1.cache"), SecretString::from("pw"));
        let admin = ProfileId::new("AWS", "Prod", "Admin");
        store.put(&admin, Mode::KubeExec, &record())?;

        assert_eq!(scrypt_log_n(&std::fs::read(store.path())?), Some(DEFAULT_WORK_FACTOR));
        assert_eq!(store.get(&admin, Mode::KubeExec)?, Some(record()));
        Ok(())
    }

    #[test]
    fn test_higher_configured_factor_still_opens_with_default() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("t1.cache");
        let admin = ProfileId::new("AWS", "Prod", "Admin");
        EncryptedFileCache::new(&path, SecretString::from("pw"))
            .with_work_factor(Some(DEFAULT_WORK_FACTOR + 1))
            .put(&admin, Mode::KubeExec, &record())?;

        let reopened = EncryptedFileCache::new(&path, SecretString::from("pw")).with_work_factor(None);
        assert_eq!(scrypt_log_n(&std::fs::read(&path)?), Some(DEFAULT_WORK_FACTOR + 1));
        assert_eq!(reopened.get(&admin, Mode::KubeExec)?, Some(record()));
        Ok(())
    }

    #[test]
    fn test_unknown_version_tag() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = cache(&dir, "pw");
        std::fs::write(store.path(), b"credbroker-cache v9\nwhatever")?;

        let err = store
            .get(&ProfileId::new("AWS", "Prod", "Admin"), Mode::KubeExec)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedCacheVersion { found, .. } if found.ends_with("v9")));
        Ok(())
    }

    #[test]
    fn test_foreign_file_is_unreadable() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = cache(&dir, "pw");
        std::fs::write(store.path(), b"{\"plain\": \"json\"}")?;

        let err = store
            .get(&ProfileId::new("AWS", "Prod", "Admin"), Mode::KubeExec)
            .unwrap_err();
        assert!(matches!(err, Error::CacheUnreadable { .. }));
        Ok(())
    }
}
