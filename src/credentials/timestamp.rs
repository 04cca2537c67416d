//! Expiration timestamps.
//!
//! Persisted timestamps are naive UTC (`2026-03-01T12:00:00` or with
//! fractional seconds) and carry no offset. Inputs that do carry one, such as
//! a trailing `Z` or `+02:00`, are converted to UTC rather than having the
//! suffix dropped.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{de, Deserialize, Deserializer, Serializer};

use crate::error::{Error, Result};

const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub fn parse_expiration(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, NAIVE_FORMAT) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Storage form: naive UTC, no suffix.
pub fn format_naive_utc(at: &DateTime<Utc>) -> String {
    at.naive_utc().format(NAIVE_FORMAT).to_string()
}

/// Wire form for external protocols that require RFC 3339.
pub fn format_rfc3339(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Serde adapter for `#[serde(with = "naive_utc")]`.
pub mod naive_utc {
    use super::*;

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_naive_utc(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_expiration(&raw).map_err(de::Error::custom)
    }
}
