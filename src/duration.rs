//! Human-readable durations ("1h", "30m", "45s", "2d") for config files and log output.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{de, Deserialize, Deserializer, Serializer};

const UNITS: [(char, u64); 4] = [('d', 24 * 60 * 60), ('h', 60 * 60), ('m', 60), ('s', 1)];

/// Parse a single-unit duration such as `"1h"` or `"90s"`.
///
/// Case-insensitive; surrounding whitespace is ignored.
///
/// ```
/// use ratebook::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
/// assert_eq!(parse_duration(" 30M ").unwrap(), Duration::from_secs(1800));
/// ```
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim().to_ascii_lowercase();
    let Some(unit) = s.chars().last() else {
        bail!("Duration is empty");
    };
    let Some(&(_, scale)) = UNITS.iter().find(|(c, _)| *c == unit) else {
        bail!("Duration {input:?} must end with d, h, m, or s");
    };

    let digits = &s[..s.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        bail!("Invalid number in duration {input:?}");
    }
    let count: u64 = digits
        .parse()
        .with_context(|| format!("Invalid number in duration {input:?}"))?;
    let secs = count
        .checked_mul(scale)
        .with_context(|| format!("Duration {input:?} is too large"))?;

    Ok(Duration::from_secs(secs))
}

/// Render a duration with the largest unit that divides it evenly.
///
/// ```
/// use ratebook::duration::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
/// assert_eq!(format_duration(Duration::from_secs(3700)), "3700s");
/// ```
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    UNITS
        .iter()
        .find(|(_, scale)| secs >= *scale && secs % scale == 0)
        .map(|(unit, scale)| format!("{}{unit}", secs / scale))
        .unwrap_or_else(|| format!("{secs}s"))
}

/// Use with `#[serde(deserialize_with = "deserialize_duration")]`.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(de::Error::custom)
}

/// Use with `#[serde(serialize_with = "serialize_duration")]`.
pub fn serialize_duration<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(2 * 86400));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn ignores_case_and_whitespace() {
        assert_eq!(parse_duration("\t1H\n").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "  ", "h", "1", "1w", "-1h", "1.5h", "+1h", "abc"] {
            assert!(parse_duration(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn rejects_overflow() {
        let max = u64::MAX.to_string();
        assert!(parse_duration(&format!("{max}h")).is_err());
        assert!(parse_duration(&format!("{max}s")).is_ok());
    }

    #[test]
    fn formats_with_largest_even_unit() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_secs(86400)), "1d");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
    }

    #[test]
    fn serde_hooks_use_human_form() {
        #[derive(Serialize, Deserialize)]
        struct Refresh {
            #[serde(
                deserialize_with = "deserialize_duration",
                serialize_with = "serialize_duration"
            )]
            staleness: Duration,
        }

        let parsed: Refresh = toml::from_str(r#"staleness = "1h""#).unwrap();
        assert_eq!(parsed.staleness, Duration::from_secs(3600));
        let rendered = toml::to_string(&parsed).unwrap();
        assert_eq!(rendered.trim(), r#"staleness = "1h""#);
    }
}
