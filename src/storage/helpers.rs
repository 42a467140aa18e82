//! Shared storage helper functions.
//!
//! Timestamp and integer conversions used by the SQL backends. Timestamps
//! are stored as fixed-width RFC3339 UTC strings so that text comparison in
//! SQL matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

use super::{Result, StorageError};

/// Format a timestamp for storage, e.g. `2026-10-19T12:00:00.000Z`.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidTimestamp(format!("{}: {}", raw, e)))
}

/// Parse an optional stored timestamp.
pub fn parse_optional_timestamp(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_timestamp).transpose()
}

/// Convert a counter to the signed column type, saturating at `i64::MAX`.
pub fn counter_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Convert a stored counter back, rejecting negative values.
pub fn counter_from_i64(value: i64, table: &'static str) -> Result<u64> {
    u64::try_from(value).map_err(|_| StorageError::Corrupt {
        table,
        message: format!("negative counter {}", value),
    })
}
