use chrono::{DateTime, Duration, NaiveDate, Utc};

/// This is the standard way of converting a date to a session file name in pomosync.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Whole seconds between `from` and `to`, rounded towards negative infinity. A countdown that
/// is 300ms past its reference has used 0 seconds, one that is 300ms before it has used -1.
pub fn floor_seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_milliseconds().div_euclid(1000)
}

pub fn seconds(value: u32) -> Duration {
    Duration::seconds(value as i64)
}

/// Formats remaining seconds the way the timer face shows them, `mm:ss`.
pub fn format_countdown(total_seconds: u32) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}
