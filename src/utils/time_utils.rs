use chrono::DateTime;

const STANDARD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Render a millisecond epoch timestamp for log lines and the CLI's summary
/// table (spec §6 "human-readable summary").
pub fn epoch_ms_to_utc(epoch_ms: i64) -> String {
    match DateTime::from_timestamp_millis(epoch_ms) {
        Some(dt) => dt.format(STANDARD_TIME_FORMAT).to_string(),
        None => "invalid-timestamp".to_string(),
    }
}

/// Render an elapsed duration in milliseconds as a short human string,
/// used for the CLI's "finished in Xs" log line.
pub fn format_duration(ms: u128) -> String {
    let secs = ms / 1000;
    if secs < 60 {
        return format!("{secs}s");
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("{}m{}s", mins, secs % 60);
    }
    let hours = mins / 60;
    format!("{}h{}m", hours, mins % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_short_durations_in_seconds() {
        assert_eq!(format_duration(4_500), "4s");
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_duration(125_000), "2m5s");
    }

    #[test]
    fn invalid_timestamp_does_not_panic() {
        assert_eq!(epoch_ms_to_utc(i64::MAX), "invalid-timestamp");
    }
}
