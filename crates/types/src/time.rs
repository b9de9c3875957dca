use std::time::{SystemTime, UNIX_EPOCH};

/// Format a wall-clock time as ISO 8601 UTC (`YYYY-MM-DDTHH:MM:SSZ`).
///
/// Times before the Unix epoch clamp to the epoch.
pub fn format_iso8601(time: SystemTime) -> String {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0);

    let days = secs / 86_400;
    let time_of_day = secs % 86_400;
    let hours = time_of_day / 3_600;
    let minutes = (time_of_day % 3_600) / 60;
    let seconds = time_of_day % 60;

    let (year, month, day) = days_to_ymd(days);
    format!("{year:04}-{month:02}-{day:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
}

pub fn now_iso8601() -> String {
    format_iso8601(SystemTime::now())
}

/// Days since the Unix epoch to (year, month, day), Howard Hinnant's
/// civil-from-days algorithm.
fn days_to_ymd(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn epoch_formats_as_1970() {
        assert_eq!(format_iso8601(UNIX_EPOCH), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn known_timestamp_formats_correctly() {
        // 2001-09-09T01:46:40Z, the billennium.
        let time = UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        assert_eq!(format_iso8601(time), "2001-09-09T01:46:40Z");
    }

    #[test]
    fn leap_day_is_handled() {
        // 2024-02-29T12:00:00Z
        let time = UNIX_EPOCH + Duration::from_secs(1_709_208_000);
        assert_eq!(format_iso8601(time), "2024-02-29T12:00:00Z");
    }

    #[test]
    fn now_has_iso_shape() {
        let ts = now_iso8601();
        assert_eq!(ts.len(), 20);
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[10..11], "T");
    }
}
