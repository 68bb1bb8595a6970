//! Relative "time ago" labels for comment timestamps.

use chrono::{DateTime, Utc};

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Relative label for a comment, computed once against `now`.
///
/// Whole hours are floored; anything under an hour (including timestamps
/// slightly in the future) reads "just now".
pub fn format_time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = (now - then).num_milliseconds().div_euclid(MILLIS_PER_HOUR);
    if hours < 1 {
        return "just now".to_string();
    }
    if hours == 1 {
        return "1h ago".to_string();
    }
    if hours < 24 {
        return format!("{hours}h ago");
    }

    let days = hours / 24;
    if days == 1 {
        "1 day ago".to_string()
    } else {
        format!("{days} days ago")
    }
}
