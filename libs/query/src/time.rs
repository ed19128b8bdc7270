use activity_common::FieldError;
use chrono::{DateTime, Days, Duration, Utc};

/// Parse one `start`/`end` field per the time grammar in §6: RFC3339
/// (with or without nanoseconds), `now`, or `now-<N><unit>` with `unit in
/// {s, m, h, d, w}`. Days and weeks use calendar-day arithmetic; hours
/// and smaller use an exact duration. Everything here runs in UTC, so the
/// calendar/exact distinction only matters at the day/week granularity
/// where a caller's local day boundary could otherwise drift -- we still
/// honor it explicitly rather than silently collapsing to `Duration::days`.
/// Future timestamps are rejected.
pub fn parse_time(field: &str, raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, FieldError> {
    let value = if raw == "now" {
        now
    } else if let Some(rest) = raw.strip_prefix("now-") {
        parse_relative(rest, now)
            .ok_or_else(|| FieldError::invalid(field, format!("invalid relative time {raw:?}")))?
    } else {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| FieldError::invalid(field, format!("invalid RFC3339 timestamp {raw:?}")))?
    };

    if value > now {
        return Err(FieldError::invalid(
            field,
            "time value must not be in the future",
        ));
    }
    Ok(value)
}

fn parse_relative(rest: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let unit = rest.chars().last()?;
    let magnitude = &rest[..rest.len() - unit.len_utf8()];
    let n: i64 = magnitude.parse().ok()?;
    if n < 0 {
        return None;
    }
    match unit {
        's' => now.checked_sub_signed(Duration::seconds(n)),
        'm' => now.checked_sub_signed(Duration::minutes(n)),
        'h' => now.checked_sub_signed(Duration::hours(n)),
        'd' => now.checked_sub_days(Days::new(n as u64)),
        'w' => now.checked_sub_days(Days::new(n as u64 * 7)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-07-28T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn parses_rfc3339() {
        let parsed = parse_time("start", "2026-01-01T00:00:00Z", now()).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn parses_now() {
        assert_eq!(parse_time("start", "now", now()).unwrap(), now());
    }

    #[test]
    fn parses_relative_hours() {
        let parsed = parse_time("start", "now-48h", now()).unwrap();
        assert_eq!(parsed, now() - Duration::hours(48));
    }

    #[test]
    fn parses_relative_days() {
        let parsed = parse_time("start", "now-7d", now()).unwrap();
        assert_eq!(parsed, now() - Duration::days(7));
    }

    #[test]
    fn rejects_future_timestamps() {
        assert!(parse_time("start", "2099-01-01T00:00:00Z", now()).is_err());
    }

    #[test]
    fn rejects_malformed_relative() {
        assert!(parse_time("start", "now-xh", now()).is_err());
        assert!(parse_time("start", "now--5h", now()).is_err());
    }
}
