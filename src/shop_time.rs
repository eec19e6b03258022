//! Conversions between UTC storage and the shop's civil time.
//!
//! Everything is stored and compared as `TIMESTAMPTZ`; the shop offset only
//! matters when reading naive timestamps from admins and when rendering text.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

use crate::error::{AppError, AppResult};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse RFC 3339, or a naive timestamp interpreted in the shop offset.
pub fn parse_shop_time(input: &str, offset: FixedOffset) -> AppResult<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .ok_or_else(|| AppError::bad_request(format!("Invalid date time: {input}")))?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AppError::bad_request(format!("Ambiguous date time: {input}")))
}

pub fn format_shop_time(dt: DateTime<Utc>, offset: FixedOffset, fmt: &str) -> String {
    dt.with_timezone(&offset).format(fmt).to_string()
}
