use chrono::{DateTime, FixedOffset, TimeZone};
use common::Result;
use rand::Rng;
use std::time::Duration;

/// Parses the timestamp formats the platforms emit: RFC 3339
/// (`2024-03-01T02:00:00.000Z`) and the Graph API's colon-less offset
/// (`2024-03-01T10:15:00+0000`).
pub fn parse_platform_timestamp(raw: &str) -> Result<DateTime<FixedOffset>> {
    let raw = raw.trim();
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Ok(parsed),
        Err(_) => Ok(DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")?),
    }
}

pub fn to_report_time<Tz: TimeZone>(time: DateTime<Tz>, offset: FixedOffset) -> DateTime<FixedOffset> {
    time.with_timezone(&offset)
}

pub async fn sleep_with_jitter(base_ms: u64, jitter_ms: u64) {
    let jitter = if jitter_ms == 0 {
        0
    } else {
        rand::rng().random_range(0..=jitter_ms)
    };
    tokio::time::sleep(Duration::from_millis(base_ms + jitter)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_graph_api_offset() {
        let parsed = parse_platform_timestamp("2024-03-01T10:15:00+0000").unwrap();
        let bangkok = to_report_time(parsed, FixedOffset::east_opt(7 * 3600).unwrap());
        assert_eq!(bangkok.hour(), 17);
        assert_eq!(bangkok.minute(), 15);
        assert_eq!(bangkok.offset().local_minus_utc(), 7 * 3600);
    }

    #[test]
    fn test_parse_rfc3339_crossing_midnight() {
        let parsed = parse_platform_timestamp("2024-03-01T20:30:00.000Z").unwrap();
        let bangkok = to_report_time(parsed, FixedOffset::east_opt(7 * 3600).unwrap());
        assert_eq!(bangkok.day(), 2);
        assert_eq!(bangkok.hour(), 3);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_platform_timestamp("not a date").is_err());
        assert!(parse_platform_timestamp("").is_err());
    }
}
