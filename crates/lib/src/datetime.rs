//! # Lenient Date Handling
//!
//! Timestamps arrive as native database values, as ISO strings from SQLite,
//! or as whatever the spreadsheet renders. Parsing never fails loudly: an
//! unrecognised value simply has no date.

use crate::types::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%-m/%-d/%Y %-H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%-m/%-d/%Y", "%d/%m/%Y"];

/// Parses a timestamp in any of the supported textual layouts.
///
/// Offsets are normalised to UTC. A bare date parses as midnight.
pub fn parse_lenient_datetime(input: &str) -> Option<NaiveDateTime> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    // Postgres renders timestamptz as `2026-01-30 10:15:00+00`.
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    parse_lenient_date(s).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parses a bare calendar date. See `value_as_date` for timestamps.
pub fn parse_lenient_date(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    None
}

pub fn value_as_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Timestamp(ts) => Some(*ts),
        Value::Date(d) => d.and_hms_opt(0, 0, 0),
        Value::Text(s) => parse_lenient_datetime(s),
        _ => None,
    }
}

pub fn value_as_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Date(d) => Some(*d),
        Value::Timestamp(ts) => Some(ts.date()),
        Value::Text(s) => {
            parse_lenient_date(s).or_else(|| parse_lenient_datetime(s).map(|dt| dt.date()))
        }
        _ => None,
    }
}

/// Reformats a timestamp-like value as text using `pattern`.
///
/// Null and unparseable input produce `Value::Null`.
pub fn format_timestamp(value: &Value, pattern: &str) -> Value {
    match value_as_datetime(value) {
        Some(ts) => Value::Text(ts.format(pattern).to_string()),
        None => Value::Null,
    }
}
