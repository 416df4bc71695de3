//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Format a Unix timestamp as ISO 8601 (e.g., "2025-01-01T00:00:00Z").
pub fn format_timestamp_iso8601(timestamp: u64) -> String {
    let timestamp = i64::try_from(timestamp).unwrap_or(i64::MAX);
    chrono::DateTime::from_timestamp(timestamp, 0)
        .unwrap_or_else(chrono::Utc::now)
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// Current Unix timestamp in seconds, respecting `SOURCE_DATE_EPOCH`.
///
/// Metric timestamps go through here so tests and reproducible runs can pin
/// the clock.
pub fn get_now() -> u64 {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        })
}
