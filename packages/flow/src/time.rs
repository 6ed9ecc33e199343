//! Time parsing for flow rows.
//!
//! Flow sheets carry their `time` column in a handful of loosely formatted
//! layouts. Layouts are tried in a fixed order and the first full match
//! wins; anything else is treated as "no time". All times are UTC.

use chrono::{NaiveDate, NaiveDateTime};
use flowmap_flow_models::{TimeValue, Timestamp};

/// Date-time layouts, tried after the plain date and before the partial
/// year / year-month layouts.
const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parses a time cell. A native timestamp passes through unchanged; text is
/// tried as `Y-M-D`, `Y-M-D H:M`, `Y-M-D H:M:S`, `Y`, then `Y-M`.
#[must_use]
pub fn parse_time(input: Option<&TimeValue>) -> Option<Timestamp> {
    match input? {
        TimeValue::Timestamp(ts) => Some(*ts),
        TimeValue::Text(s) => parse_time_str(s),
    }
}

/// Parses a textual time using the same layout order as [`parse_time`].
#[must_use]
pub fn parse_time_str(s: &str) -> Option<Timestamp> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    parse_year(s)
        .and_then(|year| start_of(year, 1))
        .or_else(|| parse_year_month(s))
}

fn parse_year(s: &str) -> Option<i32> {
    if s.is_empty() || s.len() > 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_year_month(s: &str) -> Option<Timestamp> {
    let (year, month) = s.split_once('-')?;
    let year = parse_year(year)?;
    if month.is_empty() || month.len() > 2 || !month.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    start_of(year, month.parse().ok()?)
}

fn start_of(year: i32, month: u32) -> Option<Timestamp> {
    NaiveDate::from_ymd_opt(year, month, 1)?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
}
