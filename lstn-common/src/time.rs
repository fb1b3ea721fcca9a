//! Timestamp and period-key utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Calendar-month key ("YYYY-MM", UTC) for a unix timestamp
pub fn month_key(unix_seconds: i64) -> String {
    timestamp(unix_seconds).format("%Y-%m").to_string()
}

/// Calendar-day key ("YYYY-MM-DD", UTC) for a unix timestamp
pub fn day_key(unix_seconds: i64) -> String {
    timestamp(unix_seconds).format("%Y-%m-%d").to_string()
}

/// Round a minutes value to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn timestamp(unix_seconds: i64) -> DateTime<Utc> {
    // Out-of-range timestamps clamp to the epoch rather than panic
    DateTime::<Utc>::from_timestamp(unix_seconds, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
