use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

/// Length of the "today" window used by the Today source and its counter.
pub const TODAY_WINDOW: Duration = Duration::hours(24);

/// True when `published` falls within the 24 hours before `now`.
///
/// Future timestamps (clock skew between server and client) count as recent.
pub fn is_within_last_24h(published: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    published >= now - TODAY_WINDOW
}

/// Parses a timestamp in any of the formats seen in build metadata and
/// remote version files.
///
/// Accepts RFC 3339, git's `--date=iso` output (`2024-05-01 12:00:00 +0200`),
/// a naive `YYYY-MM-DD HH:MM:SS` taken as UTC, a bare `YYYY-MM-DD`, and
/// numeric Unix timestamps in seconds or milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }
    if let Ok(n) = s.parse::<i64>() {
        // Anything past year 2286 in seconds is treated as milliseconds
        return if n.abs() >= 10_000_000_000 {
            DateTime::from_timestamp_millis(n)
        } else {
            DateTime::from_timestamp(n, 0)
        };
    }
    None
}

/// Short relative age for list rows: `now`, `5m`, `3h`, `2d`, then a date.
pub fn format_relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(at);
    if delta < Duration::minutes(1) {
        "now".to_string()
    } else if delta < Duration::hours(1) {
        format!("{}m", delta.num_minutes())
    } else if delta < Duration::days(1) {
        format!("{}h", delta.num_hours())
    } else if delta < Duration::days(7) {
        format!("{}d", delta.num_days())
    } else {
        at.format("%Y-%m-%d").to_string()
    }
}
