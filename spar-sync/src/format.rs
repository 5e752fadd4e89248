//! Compact age rendering for plan and status output.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Age of `timestamp` at `now`, e.g. `45s`, `3m`, `2h`, `6d`.
pub fn format_age(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = now.signed_duration_since(timestamp).num_seconds().max(0) as u64;
    format_seconds(secs)
}

pub fn format_duration(duration: Duration) -> String {
    format_seconds(duration.as_secs())
}

pub fn format_seconds(seconds: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;
    match seconds {
        s if s < MINUTE => format!("{s}s"),
        s if s < HOUR => format!("{}m", s / MINUTE),
        s if s < DAY => format!("{}h", s / HOUR),
        s => format!("{}d", s / DAY),
    }
}
