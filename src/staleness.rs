//! Staleness detection for the cached rate set.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tracing::info;

use crate::duration::format_duration;
use crate::local::NEVER_SYNCED;

/// Default maximum age of cached rates before a bulk read must refresh.
pub const DEFAULT_STALENESS_THRESHOLD: Duration = Duration::from_secs(60 * 60);

/// Result of a staleness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalenessCheck {
    pub is_stale: bool,
    /// `None` when rates were never synced.
    pub age: Option<Duration>,
    pub threshold: Duration,
}

impl StalenessCheck {
    pub fn stale(age: Duration, threshold: Duration) -> Self {
        Self {
            is_stale: true,
            age: Some(age),
            threshold,
        }
    }

    pub fn fresh(age: Duration, threshold: Duration) -> Self {
        Self {
            is_stale: false,
            age: Some(age),
            threshold,
        }
    }

    pub fn missing(threshold: Duration) -> Self {
        Self {
            is_stale: true,
            age: None,
            threshold,
        }
    }
}

/// Decide whether rates last synced at `last_sync` (epoch seconds) are stale at `now`.
///
/// Stale means strictly older than the threshold. A timestamp in the future
/// counts as age zero.
pub fn check_rates_staleness(
    last_sync: i64,
    now: DateTime<Utc>,
    threshold: Duration,
) -> StalenessCheck {
    if last_sync == NEVER_SYNCED {
        return StalenessCheck::missing(threshold);
    }
    let Some(synced_at) = Utc.timestamp_opt(last_sync, 0).single() else {
        return StalenessCheck::missing(threshold);
    };

    let age = (now - synced_at).to_std().unwrap_or(Duration::ZERO);
    if age > threshold {
        StalenessCheck::stale(age, threshold)
    } else {
        StalenessCheck::fresh(age, threshold)
    }
}

/// Log staleness check results for the cached rates.
pub fn log_rates_staleness(source: &str, check: &StalenessCheck) {
    let status = if check.is_stale { "stale" } else { "fresh" };
    let age_str = check
        .age
        .map(format_duration)
        .unwrap_or_else(|| "never".to_string());

    info!(
        source = source,
        age = %age_str,
        threshold = %format_duration(check.threshold),
        status = status,
        "rates staleness check"
    );
}
