/// Time helpers for file naming, row formatting and human-readable logging
use time::{format_description, OffsetDateTime};

/// Source of the current UTC time.
///
/// The acquisition loop asks the clock once per cycle, so tests can move a
/// station across midnight without waiting for it.
pub trait Clock {
    fn now_utc(&self) -> OffsetDateTime;
}

/// Wall clock of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format.
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]")
        .ok()
        .and_then(|format| dt.format(&format).ok())
        .unwrap_or_else(|| dt.to_string())
}

/// `YYYYMMDD`, the date column of data and log rows.
pub fn format_date(dt: &OffsetDateTime) -> String {
    format!("{:04}{:02}{:02}", dt.year(), u8::from(dt.month()), dt.day())
}

/// `HHMMSS`, the time column of data and log rows.
pub fn format_time(dt: &OffsetDateTime) -> String {
    format!("{:02}{:02}{:02}", dt.hour(), dt.minute(), dt.second())
}

/// Whole seconds elapsed since UTC midnight.
pub fn seconds_of_day(dt: &OffsetDateTime) -> u32 {
    u32::from(dt.hour()) * 3600 + u32::from(dt.minute()) * 60 + u32::from(dt.second())
}

/// Convert a time::Duration to seconds as u64
pub fn duration_to_seconds(duration: time::Duration) -> u64 {
    duration.whole_seconds().max(0) as u64
}
