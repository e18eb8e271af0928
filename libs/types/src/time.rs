//! Journal date format
//!
//! Every instant written to a journal (entry timestamps, the context's "now",
//! date arguments) uses UTC with millisecond precision, e.g.
//! `2024-03-01T12:30:05.123Z`. Values are truncated to milliseconds when they
//! enter the model so that a written entry reads back unchanged.

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};

/// `strftime` pattern for journal dates.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format an instant in the journal date format.
pub fn format_date(instant: &DateTime<Utc>) -> String {
    instant.format(DATE_FORMAT).to_string()
}

/// Parse a journal date.
pub fn parse_date(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let naive = NaiveDateTime::parse_from_str(text.trim(), DATE_FORMAT)?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Drop sub-millisecond precision.
pub fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.trunc_subsecs(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_and_parse() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap()
            + chrono::Duration::milliseconds(123);
        let text = format_date(&instant);
        assert_eq!(text, "2024-03-01T12:30:05.123Z");
        assert_eq!(parse_date(&text).unwrap(), instant);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_date("yesterday").is_err());
        assert!(parse_date("2024-03-01 12:30:05").is_err());
    }

    #[test]
    fn test_truncate_drops_micros() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
            + chrono::Duration::microseconds(1_234_567);
        let truncated = truncate_to_millis(instant);
        assert_eq!(truncated.timestamp_millis(), instant.timestamp_millis());
        assert_eq!(format_date(&truncated), "2024-03-01T00:00:01.234Z");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_truncated_dates_survive_format(micros in 0i64..4_102_444_800_000_000) {
            let nanos = (micros % 1_000_000) as u32 * 1_000;
            let instant = truncate_to_millis(Utc.timestamp_opt(micros / 1_000_000, nanos).unwrap());
            prop_assert_eq!(parse_date(&format_date(&instant)).unwrap(), instant);
            prop_assert_eq!(truncate_to_millis(instant), instant);
        }
    }
}
