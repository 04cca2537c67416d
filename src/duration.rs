//! Human-readable durations for config values such as `timeout = "90s"`.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer};

/// Parse a duration string like "2m" or "45s".
///
/// Accepted units are `h`, `m` and `s`; input is trimmed and case-insensitive.
///
/// ```
/// use credbroker::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
/// assert_eq!(parse_duration(" 45S ").unwrap(), Duration::from_secs(45));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_ascii_lowercase();
    let Some(unit) = s.chars().last() else {
        anyhow::bail!("Duration is empty");
    };
    let digits = &s[..s.len() - unit.len_utf8()];

    let multiplier: u64 = match unit {
        'h' => 60 * 60,
        'm' => 60,
        's' => 1,
        _ => anyhow::bail!("Duration must end with h, m, or s"),
    };
    let count: u64 = digits
        .parse()
        .with_context(|| format!("Invalid number in duration {s:?}"))?;
    let secs = count
        .checked_mul(multiplier)
        .context("Duration is too large")?;

    Ok(Duration::from_secs(secs))
}

/// Serde deserializer for optional duration strings.
///
/// Use with `#[serde(default, deserialize_with = "deserialize_duration_opt")]`.
pub fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| parse_duration(&s).map_err(de::Error::custom))
        .transpose()
}
