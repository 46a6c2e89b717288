use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

use crate::error::ScheduleError;

/// Canonical textual form of a schedule timestamp.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Naive formats accepted for a start time, tried in order.
const START_TIME_FORMATS: &[&str] = &[
    TIME_FORMAT,
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse a start time such as `2025-03-09 12:55`.
///
/// Accepts the canonical `YYYY-MM-DD HH:MM` form, the same with seconds,
/// ISO-8601 with a `T` separator, and RFC 3339 with an offset. An offset is
/// dropped and the wall-clock reading kept, since the active window is a
/// wall-clock window.
pub fn parse_start_time(value: &str) -> Result<NaiveDateTime, ScheduleError> {
    let trimmed = value.trim();

    for format in START_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.naive_local())
        .map_err(|_| ScheduleError::UnparseableStartTime(value.to_string()))
}

/// Round a timestamp up to a quarter-hour boundary.
///
/// Minutes 1-15 go to :15, 16-30 to :30, 31-45 to :45. Minute 0 and minutes
/// 46-59 go to the next hour's :00, carrying into the next day after 23:xx.
/// Seconds and sub-seconds are always zeroed.
///
/// Returns `None` when the rounded time would fall past the last
/// representable date.
pub fn round_to_quarter_hour(value: NaiveDateTime) -> Option<NaiveDateTime> {
    let hour_start = value
        .date()
        .and_time(NaiveTime::MIN)
        .checked_add_signed(TimeDelta::hours(i64::from(value.hour())))?;

    let minutes = match value.minute() {
        1..=15 => 15,
        16..=30 => 30,
        31..=45 => 45,
        _ => 60,
    };

    hour_start.checked_add_signed(TimeDelta::minutes(minutes))
}

/// Render a timestamp in [`TIME_FORMAT`].
pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIME_FORMAT).to_string()
}

/// Parse one bound of the active window into `(hour, minute)`.
///
/// Window bounds in the config may be written as `"08:00"`, a bare hour such
/// as `"22"`, or a named time (`"morning"` is 08:00, `"late"` is 22:00).
/// `"24:00"` is allowed so a window can run to midnight. The caller rejects
/// bounds that are not whole hours.
pub fn parse_clock_time(time_str: &str) -> Option<(u32, u32)> {
    let trimmed = time_str.trim();

    let time_lower = trimmed.to_lowercase();
    let named_time = match time_lower.as_str() {
        "morning" | "breakfast" => Some((8, 0)),
        "midmorning" | "mid-morning" => Some((10, 0)),
        "noon" | "midday" | "lunch" => Some((12, 0)),
        "afternoon" => Some((15, 0)),
        "evening" | "dinner" => Some((18, 0)),
        "night" | "bedtime" => Some((21, 0)),
        "late" | "late night" => Some((22, 0)),
        "midnight" => Some((0, 0)),
        _ => None,
    };

    if let Some(time) = named_time {
        return Some(time);
    }

    if trimmed.contains(':') {
        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() != 2 {
            return None;
        }

        let hour = parts[0].trim().parse::<u32>().ok()?;
        let minute = parts[1].trim().parse::<u32>().ok()?;

        if !is_valid_clock(hour, minute) {
            return None;
        }

        return Some((hour, minute));
    }

    let hour = trimmed.parse::<u32>().ok()?;
    if !is_valid_clock(hour, 0) {
        return None;
    }
    Some((hour, 0))
}

fn is_valid_clock(hour: u32, minute: u32) -> bool {
    (hour < 24 && minute < 60) || (hour == 24 && minute == 0)
}
