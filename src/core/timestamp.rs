//! Transaction timestamp parsing and formatting.
//!
//! This is the one place stored creation timestamps are read. Two shapes are accepted:
//! RFC 3339 (what this crate writes) and the legacy `dd/MM/yyyy HH:mm` local-time label.
//! Anything else parses to `None`; callers exclude such sales from date-bounded views
//! instead of failing the whole report.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};

/// Display format for dates, also accepted as a legacy storage format.
pub const LABEL_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Formats a timestamp for storage: RFC 3339, UTC, millisecond precision.
///
/// The output has a fixed width, so string order equals chronological order.
#[must_use]
pub fn format_storage(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a stored timestamp, reading legacy labels as local time.
#[must_use]
pub fn parse(value: &str) -> Option<DateTime<Utc>> {
    parse_in(value, &Local)
}

/// Parses a stored timestamp, reading legacy labels in the given time zone.
#[must_use]
pub fn parse_in<Tz: TimeZone>(value: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }

    let parsed = NaiveDateTime::parse_from_str(trimmed, LABEL_FORMAT)
        .ok()
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc));

    if parsed.is_none() {
        tracing::warn!(value = trimmed, "Unparsable transaction timestamp");
    }
    parsed
}

/// Renders `dd/MM/yyyy HH:mm` in local time.
#[must_use]
pub fn format_label(at: DateTime<Utc>) -> String {
    format_label_in(at, &Local)
}

/// Renders `dd/MM/yyyy HH:mm` in the given time zone.
#[must_use]
pub fn format_label_in<Tz: TimeZone>(at: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.with_timezone(tz).format(LABEL_FORMAT).to_string()
}

/// Midnight at the start of `date` in `tz`.
///
/// When midnight does not exist (a DST gap) the UTC reading of midnight is used.
pub fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}
