//! Calendar-day bucketing
//!
//! Every record is keyed by the local calendar day it belongs to. Instants are
//! never bucketed by their UTC date.

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, TimeZone, Utc};
use serde_json::Value;

/// Day format used for every date this crate writes.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Seconds from the Unix epoch to 2001-01-01T00:00:00Z.
///
/// Older pipeline versions encoded dates as seconds relative to this instant.
pub const REFERENCE_DATE_OFFSET_SECS: i64 = 978_307_200;

/// Calendar day of `instant` in its own time zone.
pub fn day_of<Tz: TimeZone>(instant: &DateTime<Tz>) -> NaiveDate {
    instant.date_naive()
}

/// Sunday of the week containing `day`, or `None` outside chrono's date range.
pub fn start_of_week(day: NaiveDate) -> Option<NaiveDate> {
    day.checked_sub_days(Days::new(u64::from(day.weekday().num_days_from_sunday())))
}

/// The seven days (Sunday through Saturday) of the week containing `day`.
///
/// `None` when part of that week falls outside chrono's date range.
pub fn week_days(day: NaiveDate) -> Option<[NaiveDate; 7]> {
    let sunday = start_of_week(day)?;
    sunday.checked_add_days(Days::new(6))?;
    Some(std::array::from_fn(|offset| sunday + Days::new(offset as u64)))
}

/// Converts seconds since the 2001 reference date into an instant.
pub fn reference_seconds_to_instant(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let millis = (seconds * 1000.0).round();
    if millis.abs() > i64::MAX as f64 / 2.0 {
        return None;
    }
    (REFERENCE_DATE_OFFSET_SECS * 1000)
        .checked_add(millis as i64)
        .and_then(DateTime::from_timestamp_millis)
}

/// Interprets a stored `date` value as a calendar day in `tz`.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and reference-date seconds.
/// Returns `None` for anything else.
pub fn parse_stored_day_in<Tz: TimeZone>(value: &Value, tz: &Tz) -> Option<NaiveDate> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if let Ok(day) = NaiveDate::parse_from_str(text, DAY_FORMAT) {
                return Some(day);
            }
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|instant| day_of(&instant.with_timezone(tz)))
        }
        Value::Number(number) => number
            .as_f64()
            .and_then(reference_seconds_to_instant)
            .map(|instant| day_of(&instant.with_timezone(tz))),
        _ => None,
    }
}

/// [`parse_stored_day_in`] using the local time zone.
pub fn parse_stored_day(value: &Value) -> Option<NaiveDate> {
    parse_stored_day_in(value, &Local)
}

/// Serde adapter for `date` fields: writes `YYYY-MM-DD`, reads any format
/// accepted by [`parse_stored_day`].
pub mod serde_day {
    use super::{parse_stored_day, DAY_FORMAT};
    use chrono::NaiveDate;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(day: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&day.format(DAY_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let value = Value::deserialize(deserializer)?;
        parse_stored_day(&value)
            .ok_or_else(|| D::Error::custom(format!("unrecognized date value: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Weekday};
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_same_local_day_buckets_identically() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let morning = tz.with_ymd_and_hms(2025, 3, 4, 0, 5, 0).unwrap();
        let night = tz.with_ymd_and_hms(2025, 3, 4, 23, 55, 0).unwrap();
        assert_eq!(day_of(&morning), day_of(&night));
        assert_eq!(day_of(&morning), date(2025, 3, 4));
    }

    #[test]
    fn test_local_midnight_splits_days_sharing_a_utc_date() {
        // UTC-5: 23:59 and 00:01 local are 04:59 and 05:01 UTC on the same UTC day.
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let before = tz.with_ymd_and_hms(2025, 1, 1, 23, 59, 0).unwrap();
        let after = tz.with_ymd_and_hms(2025, 1, 2, 0, 1, 0).unwrap();

        assert_eq!(
            before.with_timezone(&Utc).date_naive(),
            after.with_timezone(&Utc).date_naive()
        );
        assert_eq!(day_of(&before), date(2025, 1, 1));
        assert_eq!(day_of(&after), date(2025, 1, 2));
    }

    #[test]
    fn test_local_day_differs_from_utc_date_across_midnight() {
        // UTC+9: 20:00 UTC is already the next local day.
        let tz = FixedOffset::east_opt(9 * 3600).unwrap();
        let instant = Utc.with_ymd_and_hms(2025, 1, 1, 20, 0, 0).unwrap();
        assert_eq!(day_of(&instant.with_timezone(&tz)), date(2025, 1, 2));
        assert_eq!(instant.date_naive(), date(2025, 1, 1));
    }

    #[test]
    fn test_week_days_start_on_sunday() {
        // 2025-07-30 is a Wednesday.
        let days = week_days(date(2025, 7, 30)).unwrap();
        assert_eq!(days[0], date(2025, 7, 27));
        assert_eq!(days[0].weekday(), Weekday::Sun);
        assert_eq!(days[6], date(2025, 8, 2));
        assert_eq!(days[6].weekday(), Weekday::Sat);

        let sunday = date(2025, 7, 27);
        assert_eq!(start_of_week(sunday), Some(sunday));
    }

    #[test]
    fn test_week_days_at_calendar_limits() {
        assert_eq!(week_days(NaiveDate::MAX), None);
        assert_eq!(week_days(NaiveDate::MAX - Days::new(7)).map(|days| days.len()), Some(7));
        if NaiveDate::MIN.weekday() != Weekday::Sun {
            assert_eq!(start_of_week(NaiveDate::MIN), None);
            assert_eq!(week_days(NaiveDate::MIN), None);
        }
    }

    #[test]
    fn test_reference_seconds_conversion() {
        let instant = reference_seconds_to_instant(0.0).unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap());

        let later = reference_seconds_to_instant(86_400.0 * 2.0 + 3600.0).unwrap();
        assert_eq!(later, Utc.with_ymd_and_hms(2001, 1, 3, 1, 0, 0).unwrap());

        assert!(reference_seconds_to_instant(f64::NAN).is_none());
        assert!(reference_seconds_to_instant(f64::INFINITY).is_none());
        assert!(reference_seconds_to_instant(1e300).is_none());
    }

    #[test]
    fn test_parse_stored_day_formats() {
        assert_eq!(
            parse_stored_day_in(&json!("2025-07-28"), &Utc),
            Some(date(2025, 7, 28))
        );
        assert_eq!(
            parse_stored_day_in(&json!("2025-07-28T23:30:00-04:00"), &Utc),
            Some(date(2025, 7, 29))
        );
        // 775_353_600 seconds after 2001-01-01 is 2025-07-28T00:00:00Z.
        assert_eq!(
            parse_stored_day_in(&json!(775_353_600.0), &Utc),
            Some(date(2025, 7, 28))
        );
    }

    #[test]
    fn test_parse_stored_day_rejects_garbage() {
        assert_eq!(parse_stored_day_in(&json!("yesterday"), &Utc), None);
        assert_eq!(parse_stored_day_in(&json!(null), &Utc), None);
        assert_eq!(parse_stored_day_in(&json!({"d": 1}), &Utc), None);
        assert_eq!(parse_stored_day_in(&json!("2025-02-30"), &Utc), None);
    }
}
