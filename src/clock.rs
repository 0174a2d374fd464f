//! Wall-clock access and the fixed UTC+9 display zone.
//!
//! Every timestamp shown to the operator, and every timestamp embedded in a
//! resource name, is rendered in UTC+9 regardless of the host locale.

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Offset of the display zone from UTC, in seconds.
pub const DISPLAY_OFFSET_SECS: i32 = 9 * 60 * 60;

/// Abbreviation printed after display timestamps.
pub const DISPLAY_ZONE_ABBREVIATION: &str = "JST";

/// Source of the current time.
pub trait Clock {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that always reports the same instant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

fn display_offset() -> FixedOffset {
    FixedOffset::east_opt(DISPLAY_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Formats an instant as `YYYY-MM-DD HH:MM:SS +0900 JST`.
#[must_use]
pub fn display_timestamp(instant: DateTime<Utc>) -> String {
    let local = instant.with_timezone(&display_offset());
    format!(
        "{} {DISPLAY_ZONE_ABBREVIATION}",
        local.format("%Y-%m-%d %H:%M:%S %z")
    )
}

/// Parses an RFC 3339 provider timestamp and formats it for display.
///
/// # Errors
///
/// Returns the parser error when `raw` is not valid RFC 3339.
pub fn display_rfc3339(raw: &str) -> Result<String, chrono::ParseError> {
    let parsed = DateTime::parse_from_rfc3339(raw)?;
    Ok(display_timestamp(parsed.with_timezone(&Utc)))
}

/// Second-resolution stamp safe for resource names
/// (`YYYY-MM-DD-HH-MM-SS`).
#[must_use]
pub fn resource_stamp(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&display_offset())
        .format("%Y-%m-%d-%H-%M-%S")
        .to_string()
}

/// Human readable second-resolution stamp (`YYYY-MM-DD HH:MM:SS`).
#[must_use]
pub fn description_stamp(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&display_offset())
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
