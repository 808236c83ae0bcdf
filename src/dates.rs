// Types and utilities for the two kinds of time found in the input: sar's bare time of day
// ("09:40:03 PM"), and the timelog's full date ("Mon Jan 02 15:04:05 UTC 2024").
//
// Neither format gives us a usable UTC offset (sar gives nothing, and timezone abbreviations are
// ambiguous), so all times are naive.  Differences between naive times are still exact, which is
// all the alignment needs.

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use itertools::Itertools;
use std::str::FromStr;

/// An absolute date and time without timezone.  It has no subsecond precision in practice.

pub type Timestamp = NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meridiem {
    Am,
    Pm,
}

/// A parsed sar time of day.  The hour is as printed: on the 12-hour clock when `meridiem` is
/// present, on the 24-hour clock otherwise.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SarTime {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub meridiem: Option<Meridiem>,
}

impl SarTime {
    /// True if both times are within the same clock hour.  09:xx AM and 09:xx PM are not.
    pub fn same_hour(&self, other: &SarTime) -> bool {
        self.hour == other.hour && self.meridiem == other.meridiem
    }
}

/// Parse a sar time of day, "HH:MM:SS" optionally followed by "AM" or "PM".  Returns None if the
/// text is not of that form or the values are out of range.

pub fn parse_sartime(s: &str) -> Option<SarTime> {
    let mut parts = s.split_whitespace();
    let hms = parts.next()?;
    let meridiem = match parts.next() {
        None => None,
        Some("AM") => Some(Meridiem::Am),
        Some("PM") => Some(Meridiem::Pm),
        Some(_) => return None,
    };
    if parts.next().is_some() {
        return None;
    }

    let (h, m, s) = hms.split(':').collect_tuple()?;
    let hour = u32::from_str(h).ok()?;
    let minute = u32::from_str(m).ok()?;
    let second = u32::from_str(s).ok()?;
    let hour_ok = match meridiem {
        Some(_) => (1..=12).contains(&hour),
        None => hour < 24,
    };
    if !hour_ok || minute >= 60 || second >= 60 {
        return None;
    }
    Some(SarTime {
        hour,
        minute,
        second,
        meridiem,
    })
}

/// Parse the timelog date format, `%a %b %d %H:%M:%S %Z %Y`, eg "Mon Jan 02 15:04:05 UTC 2024".
///
/// The weekday and month must be three-letter abbreviations.  The weekday but is not checked against the date, and
/// the timezone name can be anything and is dropped.  (The program writing the timelog uses `date`,
/// and we want to accept whatever zone the machine was in.)  The text must start with the weekday;
/// runs of spaces between fields are fine, as `date` pads the day that way.

pub fn parse_timelog_date(s: &str) -> Option<Timestamp> {
    if s.starts_with(char::is_whitespace) {
        return None;
    }
    let (weekday, month, day, hms, _tz, year) = s.split_whitespace().collect_tuple()?;
    if weekday.len() != 3 || month.len() != 3 {
        return None;
    }
    Weekday::from_str(weekday).ok()?;
    NaiveDateTime::parse_from_str(&format!("{month} {day} {hms} {year}"), "%b %d %H:%M:%S %Y").ok()
}

/// Given year, month, day, hour, minute, second, return a Timestamp, or None if that's not a real
/// date or time.

pub fn timestamp_from_ymdhms(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<Timestamp> {
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

/// Convert a timestamp to seconds since the Unix epoch, optionally minus the same quantity for
/// `start`, ie, the number of seconds elapsed since `start`.
///
/// The naive time is read as UTC so that the result does not depend on the local timezone of the
/// machine doing the analysis; relative values are the same either way.

pub fn make_time(t: &Timestamp, start: Option<&Timestamp>) -> f64 {
    let sub = start.map_or(0, epoch_seconds);
    (epoch_seconds(t) - sub) as f64
}

fn epoch_seconds(t: &Timestamp) -> i64 {
    t.and_utc().timestamp()
}

/// Format a timestamp for output, "2024-01-02T15:04:05".

pub fn format_timestamp(t: &Timestamp) -> String {
    t.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[test]
fn test_parse_sartime() {
    assert!(
        parse_sartime("09:40:03 PM")
            == Some(SarTime {
                hour: 9,
                minute: 40,
                second: 3,
                meridiem: Some(Meridiem::Pm)
            })
    );
    assert!(parse_sartime("12:00:59 AM").unwrap().meridiem == Some(Meridiem::Am));
    assert!(parse_sartime("21:40:03").unwrap().hour == 21);
    assert!(parse_sartime("21:40:03").unwrap().meridiem.is_none());

    assert!(parse_sartime("").is_none());
    assert!(parse_sartime("09:40 PM").is_none());
    assert!(parse_sartime("09:40:03 XM").is_none());
    assert!(parse_sartime("09:40:03 PM extra").is_none());
    assert!(parse_sartime("13:40:03 PM").is_none());
    assert!(parse_sartime("09:60:03 PM").is_none());
    assert!(parse_sartime("09:40:60").is_none());
    assert!(parse_sartime("24:00:00").is_none());
    assert!(parse_sartime("ab:cd:ef").is_none());
}

#[test]
fn test_same_hour() {
    let a = parse_sartime("09:40:03 PM").unwrap();
    let b = parse_sartime("09:59:13 PM").unwrap();
    let c = parse_sartime("10:00:03 PM").unwrap();
    let d = parse_sartime("09:40:13 AM").unwrap();
    assert!(a.same_hour(&b));
    assert!(!a.same_hour(&c));
    assert!(!a.same_hour(&d));
}

#[test]
fn test_parse_timelog_date() {
    // 2024-01-02 is a Tuesday, the weekday is not cross-checked.
    assert!(
        parse_timelog_date("Mon Jan 02 15:04:05 UTC 2024")
            == timestamp_from_ymdhms(2024, 1, 2, 15, 4, 5)
    );
    assert!(
        parse_timelog_date("Fri Jun  7 08:00:01 CEST 2013")
            == timestamp_from_ymdhms(2013, 6, 7, 8, 0, 1)
    );

    assert!(parse_timelog_date("Xyz Jan 02 15:04:05 UTC 2024").is_none());
    assert!(parse_timelog_date("Monday Jan 02 15:04:05 UTC 2024").is_none());
    assert!(parse_timelog_date("Tue January 02 15:04:05 UTC 2024").is_none());
    assert!(parse_timelog_date(" Tue Jan 02 15:04:05 UTC 2024").is_none());
    assert!(parse_timelog_date("Mon Foo 02 15:04:05 UTC 2024").is_none());
    assert!(parse_timelog_date("Mon Jan 32 15:04:05 UTC 2024").is_none());
    assert!(parse_timelog_date("Mon Jan 02 15:04 UTC 2024").is_none());
    assert!(parse_timelog_date("Mon Jan 02 15:04:05 2024").is_none());
    assert!(parse_timelog_date("2024-01-02T15:04:05Z").is_none());
}

#[test]
fn test_make_time() {
    let t0 = timestamp_from_ymdhms(1970, 1, 1, 0, 0, 0).unwrap();
    let t1 = timestamp_from_ymdhms(1970, 1, 1, 1, 0, 10).unwrap();
    let t2 = timestamp_from_ymdhms(2024, 1, 2, 15, 4, 5).unwrap();
    let t3 = timestamp_from_ymdhms(2024, 1, 2, 15, 5, 0).unwrap();
    assert!(make_time(&t0, None) == 0.0);
    assert!(make_time(&t1, None) == 3610.0);
    assert!(make_time(&t2, None) == 1704207845.0);
    assert!(make_time(&t3, Some(&t2)) == 55.0);
    assert!(make_time(&t2, Some(&t3)) == -55.0);
    assert!(make_time(&t2, Some(&t2)) == 0.0);
}

#[test]
fn test_format_timestamp() {
    let t = timestamp_from_ymdhms(2024, 1, 2, 15, 4, 5).unwrap();
    assert!(format_timestamp(&t) == "2024-01-02T15:04:05");
}
