use anyhow::{Context, Result};
use chrono::{Local, NaiveTime, Timelike};

/// Storage format for stop times ("07:18", "23:53"). Parsing also accepts an
/// unpadded hour ("7:18").
const STORED_FORMAT: &str = "%H:%M";

/// Presentation format used in replies ("7:18 am").
const DISPLAY_FORMAT: &str = "%-I:%M %P";

/// Current local time-of-day at minute resolution.
pub fn now() -> NaiveTime {
    truncate_to_minute(Local::now().time())
}

pub fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

pub fn parse_stored(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), STORED_FORMAT)
        .with_context(|| format!("Invalid stop time: {:?}", value))
}

pub fn format_display(time: NaiveTime) -> String {
    time.format(DISPLAY_FORMAT).to_string()
}

/// Parse a time the way users type it: "18:05", "6:05 pm", "6:05pm".
pub fn parse_user_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(time) = NaiveTime::parse_from_str(value, STORED_FORMAT) {
        return Some(time);
    }

    let upper = value.to_ascii_uppercase();
    ["%I:%M %p", "%I:%M%p"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&upper, fmt).ok())
}
