//! Timestamp parsing for snapshot rows.
//!
//! What this module provides:
//! - [`parse_timestamp`]: Parse a snapshot timestamp string, trying the
//!   terminal export encoding (`2004.06.11 07:18`) first and a small chain of
//!   general-purpose fallbacks second.
//! - [`OffsetPolicy`]: What to do when a value carries a UTC offset while the
//!   snapshot convention is wall-clock naive.
//!
//! Notes:
//! - Snapshots compare timestamps naively. When an offset-carrying value
//!   (RFC 3339 with `Z` or `+hh:mm`) meets a naive one, the offset is
//!   *stripped*, not converted: both sides are assumed to express the same
//!   wall-clock convention. That assumption is a deliberate simplification
//!   carried over from the upstream dataset; [`OffsetPolicy::Reject`] exists
//!   for callers that would rather fail loudly than inherit it.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

/// The primary timestamp encoding used by the published snapshot files.
pub const STRICT_FORMAT: &str = "%Y.%m.%d %H:%M";

/// Naive fallback encodings tried after [`STRICT_FORMAT`] and RFC 3339.
const NAIVE_FALLBACK_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Errors from timestamp parsing.
#[derive(Debug, Error)]
pub enum TimestampError {
    /// The value matched none of the known encodings.
    #[error("unparseable timestamp: {0:?}")]
    Unparseable(String),

    /// The value carried a UTC offset and the policy forbids stripping it.
    #[error("timestamp {0:?} carries a UTC offset but the snapshot is offset-naive")]
    OffsetRejected(String),
}

/// Policy for offset-carrying timestamps in an offset-naive snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OffsetPolicy {
    /// Drop the offset and keep the wall-clock fields as written. This does
    /// not convert to any zone; `2021-01-05T00:00:00+02:00` becomes
    /// `2021-01-05 00:00`.
    #[default]
    Strip,
    /// Error on any offset-carrying value.
    Reject,
}

/// Parse one snapshot timestamp value.
///
/// Order of attempts:
/// 1. [`STRICT_FORMAT`] (`2004.06.11 07:18`)
/// 2. RFC 3339 (offset handled per `policy`)
/// 3. The naive fallback encodings, then a bare `%Y-%m-%d` date (midnight)
///
/// Errors with [`TimestampError::Unparseable`] when nothing matches.
pub fn parse_timestamp(value: &str, policy: OffsetPolicy) -> Result<NaiveDateTime, TimestampError> {
    let value = value.trim();

    if let Ok(dt) = NaiveDateTime::parse_from_str(value, STRICT_FORMAT) {
        return Ok(dt);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return match policy {
            OffsetPolicy::Strip => Ok(dt.naive_local()),
            OffsetPolicy::Reject => Err(TimestampError::OffsetRejected(value.to_string())),
        };
    }

    for format in NAIVE_FALLBACK_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }

    Err(TimestampError::Unparseable(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn naive(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn strict_format_parses() {
        let got = parse_timestamp("2004.06.11 07:18", OffsetPolicy::Strip).unwrap();
        assert_eq!(got, naive(2004, 6, 11, 7, 18, 0));
    }

    #[test]
    fn rfc3339_falls_back_and_strips_offset() {
        // Fails the strict format, succeeds via the general fallback.
        let got = parse_timestamp("2021-01-05T00:00:00Z", OffsetPolicy::Strip).unwrap();
        assert_eq!(got, naive(2021, 1, 5, 0, 0, 0));

        // Stripping keeps the wall clock as written, no zone conversion.
        let got = parse_timestamp("2021-01-05T06:30:00+02:00", OffsetPolicy::Strip).unwrap();
        assert_eq!(got, naive(2021, 1, 5, 6, 30, 0));
    }

    #[test]
    fn reject_policy_errors_on_offset() {
        let err = parse_timestamp("2021-01-05T00:00:00Z", OffsetPolicy::Reject).unwrap_err();
        assert!(matches!(err, TimestampError::OffsetRejected(_)));

        // Naive values are unaffected by the policy.
        assert!(parse_timestamp("2004.06.11 07:18", OffsetPolicy::Reject).is_ok());
    }

    #[test]
    fn naive_fallback_formats_parse() {
        assert_eq!(
            parse_timestamp("2024-01-01 00:02:00", OffsetPolicy::Strip).unwrap(),
            naive(2024, 1, 1, 0, 2, 0)
        );
        assert_eq!(
            parse_timestamp("2024-01-01 00:02", OffsetPolicy::Strip).unwrap(),
            naive(2024, 1, 1, 0, 2, 0)
        );
        assert_eq!(
            parse_timestamp("2024-01-01", OffsetPolicy::Strip).unwrap(),
            naive(2024, 1, 1, 0, 0, 0)
        );
    }

    #[test]
    fn garbage_is_unparseable() {
        let err = parse_timestamp("not a date", OffsetPolicy::Strip).unwrap_err();
        assert!(matches!(err, TimestampError::Unparseable(_)));
        assert!(err.to_string().contains("not a date"));
    }
}
