//! Duration parsing for config values like "22s", "30s", "5m".

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer};

/// Parse a duration string like "22s", "5m", "1h", "1d".
///
/// The input is case-insensitive and whitespace is trimmed. A zero duration is
/// rejected since every configured interval drives a timer.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    let Some(unit) = s.chars().last() else {
        anyhow::bail!("Duration must not be empty");
    };
    let multiplier: u64 = match unit {
        'd' => 24 * 60 * 60,
        'h' => 60 * 60,
        'm' => 60,
        's' => 1,
        _ => anyhow::bail!("Duration must end with d, h, m, or s"),
    };

    let num: u64 = s[..s.len() - 1]
        .parse()
        .with_context(|| format!("Invalid number in duration {s:?}"))?;
    if num == 0 {
        anyhow::bail!("Duration must be greater than zero");
    }

    let secs = num
        .checked_mul(multiplier)
        .context("Duration is too large")?;
    Ok(Duration::from_secs(secs))
}

/// Render a duration using the largest unit that divides it evenly.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    for (unit, size) in [("d", 24 * 60 * 60), ("h", 60 * 60), ("m", 60)] {
        if secs >= size && secs % size == 0 {
            return format!("{}{unit}", secs / size);
        }
    }
    format!("{secs}s")
}

/// Serde deserializer for duration strings.
///
/// Use with `#[serde(deserialize_with = "deserialize_duration")]`.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(de::Error::custom)
}
