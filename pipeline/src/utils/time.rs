//! Time utility functions
//!
//! All instants in the store are INTEGER Unix seconds, UTC.

use chrono::{DateTime, NaiveDate, Utc};

/// Seconds in one hour
pub const SECS_PER_HOUR: i64 = 3600;

/// Convert Unix seconds to DateTime<Utc>
pub fn secs_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(|| {
        tracing::warn!(secs, "Invalid timestamp, using epoch");
        DateTime::UNIX_EPOCH
    })
}

/// Truncate an instant to the start of its hour
pub fn truncate_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    secs_to_datetime(ts.timestamp().div_euclid(SECS_PER_HOUR) * SECS_PER_HOUR)
}

/// True when truncating `ts` to the hour yields `ts` itself
pub fn is_hour_aligned(ts: DateTime<Utc>) -> bool {
    ts.timestamp().rem_euclid(SECS_PER_HOUR) == 0 && ts.timestamp_subsec_nanos() == 0
}

/// Parse a `YYYYMMDD` date string
pub fn parse_yyyymmdd(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d")
        .map_err(|e| format!("Invalid date '{}' (expected YYYYMMDD): {}", value, e))
}

/// Format a date as `YYYYMMDD`
pub fn format_yyyymmdd(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Parse ISO 8601 / RFC 3339 timestamp string to DateTime<Utc>
pub fn parse_iso_timestamp(ts: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(ts.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid timestamp '{}': {}", ts, e))
}
