//! Credential records checked out from the IAM service.
//!
//! A record pairs an opaque, cloud-specific payload (access keys, tokens,
//! client certificates) with the moment it stops being usable. The shape of
//! the payload depends on the checkout [`Mode`].

mod passphrase;
mod profile;
pub mod timestamp;

pub use passphrase::{PassphraseSource, PASSPHRASE_ENV};
pub use profile::{escape_element, ProfileId};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clock::Clock;

/// Checkout variant; selects the downstream protocol adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Console or shell use by a person at a terminal.
    Interactive,
    /// Non-interactive Kubernetes exec plugin.
    KubeExec,
    /// Cloud CLI `credential_process` hook.
    AwsCredentialProcess,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Interactive => "interactive",
            Mode::KubeExec => "kube-exec",
            Mode::AwsCredentialProcess => "aws-credential-process",
        }
    }

    /// Modes invoked by other programs, where nothing may prompt.
    pub fn is_unattended(&self) -> bool {
        !matches!(self, Mode::Interactive)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A checked-out credential.
///
/// Serialized with the IAM service's field names: `expirationTime` plus the
/// payload fields flattened alongside it.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(rename = "expirationTime", with = "timestamp::naive_utc")]
    pub expiration_time: DateTime<Utc>,

    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl CredentialRecord {
    pub fn new(expiration_time: DateTime<Utc>) -> Self {
        Self {
            expiration_time,
            payload: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    /// First string-valued payload field among `names`.
    pub fn field(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .find_map(|name| self.payload.get(*name).and_then(Value::as_str))
    }

    /// Valid iff the clock is strictly before the expiration time.
    pub fn is_valid_at(&self, clock: &dyn Clock) -> bool {
        clock.is_before(self.expiration_time)
    }
}

// Payload values are secrets; only their names are printed.
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("expiration_time", &self.expiration_time)
            .field("fields", &self.payload.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_deserialize_iam_shape() {
        let record: CredentialRecord = serde_json::from_str(
            r#"{"expirationTime":"2026-03-01T12:00:00Z","token":"abc","extra":{"n":1}}"#,
        )
        .unwrap();
        assert_eq!(
            record.expiration_time,
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(record.field(&["token"]), Some("abc"));
        assert!(record.payload.contains_key("extra"));
    }

    #[test]
    fn test_serializes_naive_utc() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let json = serde_json::to_value(CredentialRecord::new(at).with_field("token", "t")).unwrap();
        assert_eq!(json["expirationTime"], "2026-03-01T12:00:00");
        assert_eq!(json["token"], "t");
    }

    #[test]
    fn test_validity_window() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let record = CredentialRecord::new(at);
        let clock = FixedClock::new(at - Duration::minutes(1));
        assert!(record.is_valid_at(&clock));
        assert!(!record.is_valid_at(&clock.shifted(Duration::minutes(1))));
    }

    #[test]
    fn test_debug_hides_values() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let record = CredentialRecord::new(at).with_field("token", "super-secret");
        let printed = format!("{record:?}");
        assert!(printed.contains("token"));
        assert!(!printed.contains("super-secret"));
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(serde_json::to_value(Mode::KubeExec).unwrap(), "kube-exec");
        assert_eq!(Mode::AwsCredentialProcess.to_string(), "aws-credential-process");
        assert!(!Mode::Interactive.is_unattended());
        assert!(Mode::KubeExec.is_unattended());
    }
}
