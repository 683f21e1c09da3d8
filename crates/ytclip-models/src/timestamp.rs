//! Time conversion helpers for clip ranges.
//!
//! Clip boundaries are whole seconds. Users enter them as hours, minutes
//! and seconds (or a clock string); yt-dlp wants them in its
//! `--download-sections` syntax.

use thiserror::Error;

/// Errors from parsing a user-entered time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("Timestamp is empty")]
    Empty,

    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),

    #[error("Invalid timestamp format: {0}")]
    InvalidFormat(String),
}

/// Convert hours, minutes and seconds to an absolute offset in seconds.
///
/// Saturates at `u64::MAX`; range validity is the caller's concern.
pub fn seconds_from_hms(hours: u64, minutes: u64, seconds: u64) -> u64 {
    checked_seconds_from_hms(hours, minutes, seconds).unwrap_or(u64::MAX)
}

/// Like [`seconds_from_hms`], but `None` when the total does not fit in a `u64`.
pub fn checked_seconds_from_hms(hours: u64, minutes: u64, seconds: u64) -> Option<u64> {
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

/// Format seconds for yt-dlp `--download-sections`.
///
/// Produces `H:MM:SS` when there is at least one hour, otherwise `M:SS`.
///
/// # Examples
/// ```
/// use ytclip_models::timestamp::format_section_time;
/// assert_eq!(format_section_time(10), "0:10");
/// assert_eq!(format_section_time(3725), "1:02:05");
/// ```
pub fn format_section_time(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

/// Build the `*START-END` section range argument.
pub fn format_section_range(start_secs: u64, end_secs: u64) -> String {
    format!(
        "*{}-{}",
        format_section_time(start_secs),
        format_section_time(end_secs)
    )
}

/// Parse a user-entered time to whole seconds.
///
/// Supports `SS`, `M:SS` and `H:MM:SS`. Components are non-negative
/// integers; minutes and seconds are not range-checked so `0:90` is 90s.
pub fn parse_time_input(input: &str) -> Result<u64, TimestampError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parse = |name: &'static str, part: &str| {
        part.trim()
            .parse::<u64>()
            .map_err(|_| TimestampError::InvalidValue(name, part.to_string()))
    };

    let overflow = || TimestampError::InvalidValue("timestamp", input.to_string());

    let parts: Vec<&str> = input.split(':').collect();
    match parts.as_slice() {
        [s] => parse("seconds", s),
        [m, s] => checked_seconds_from_hms(0, parse("minutes", m)?, parse("seconds", s)?)
            .ok_or_else(overflow),
        [h, m, s] => checked_seconds_from_hms(
            parse("hours", h)?,
            parse("minutes", m)?,
            parse("seconds", s)?,
        )
        .ok_or_else(overflow),
        _ => Err(TimestampError::InvalidFormat(input.to_string())),
    }
}
