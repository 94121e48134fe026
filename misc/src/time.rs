use chrono::{Local, TimeZone, Utc};

/// Returns the current unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    Utc::now().timestamp() as u64
}

/// Formats a unix timestamp as a local date time string.
/// Returns "never" for a zero timestamp.
pub fn format_time(time: u64) -> String {
    if time == 0 {
        return String::from("never");
    }
    match Local.timestamp_opt(time as i64, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => String::from("invalid"),
    }
}
