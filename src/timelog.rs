// Parser for timelog files.  A timelog is written by the pipeline scripts as they move from stage to
// stage, one line per event:
//
//   <script> <stage> <date>
//
// where script and stage contain no spaces and date is the output of `date`, eg
//
//   build compile Mon Jan 02 15:04:05 UTC 2024
//
// There is no header.  Blank lines are ignored; any other line that does not parse is an error.

use crate::dates::{parse_timelog_date, Timestamp};
use crate::errors::SarError;
use crate::input::open_report;
use crate::timefix::Stamped;

use anyhow::Result;
use itertools::Itertools;
use std::io::BufRead;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelogEntry {
    pub script: String,
    pub stage: String,
    pub timestamp: Timestamp,
}

impl Stamped for TimelogEntry {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Parse a timelog file into its entries, in file order.

pub fn parse_timelog<P: AsRef<Path>>(file_name: P) -> Result<Vec<TimelogEntry>> {
    let entries = read_timelog(open_report(file_name.as_ref())?)?;
    log::debug!("{}: {} timelog entries", file_name.as_ref().display(), entries.len());
    Ok(entries)
}

pub fn read_timelog<R: BufRead>(reader: R) -> Result<Vec<TimelogEntry>> {
    let mut entries = vec![];
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let bad_entry = || SarError::TimestampFormat {
            line: n + 1,
            text: line.to_string(),
        };
        let (script, stage, date) = line.splitn(3, ' ').collect_tuple().ok_or_else(bad_entry)?;
        let timestamp = parse_timelog_date(date).ok_or_else(bad_entry)?;
        entries.push(TimelogEntry {
            script: script.to_string(),
            stage: stage.to_string(),
            timestamp,
        });
    }
    Ok(entries)
}

/// Find the first entry for `stage`, if any.

pub fn find_stage<'a>(entries: &'a [TimelogEntry], stage: &str) -> Option<&'a TimelogEntry> {
    entries.iter().find(|e| e.stage == stage)
}

#[cfg(test)]
use crate::dates::timestamp_from_ymdhms;

#[test]
fn test_read_timelog1() {
    let text = "build compile Mon Jan 02 15:04:05 UTC 2024\n";
    let x = read_timelog(text.as_bytes()).unwrap();
    assert!(
        x == vec![TimelogEntry {
            script: "build".to_string(),
            stage: "compile".to_string(),
            timestamp: timestamp_from_ymdhms(2024, 1, 2, 15, 4, 5).unwrap(),
        }]
    );
}

#[test]
fn test_read_timelog2() {
    // Blank lines and surrounding whitespace are ignored.
    let text = "\n  a b Tue Jan 02 15:04:05 UTC 2024  \n\n   \nc d Tue Jan 02 16:00:00 UTC 2024";
    let x = read_timelog(text.as_bytes()).unwrap();
    assert!(x.len() == 2);
    assert!(x[0].script == "a" && x[0].stage == "b");
    assert!(x[1].script == "c" && x[1].stage == "d");
    assert!(x[0].timestamp < x[1].timestamp);
}

#[test]
fn test_read_timelog_errors() {
    // Too few fields
    let e = read_timelog("build\n".as_bytes()).unwrap_err();
    assert!(
        e.downcast_ref::<SarError>()
            == Some(&SarError::TimestampFormat {
                line: 1,
                text: "build".to_string()
            })
    );

    // Bad date, on the second line
    let text = "a b Tue Jan 02 15:04:05 UTC 2024\nbuild compile 2024-01-02 15:04:05\n";
    let e = read_timelog(text.as_bytes()).unwrap_err();
    match e.downcast_ref::<SarError>() {
        Some(SarError::TimestampFormat { line, .. }) => assert!(*line == 2),
        _ => panic!("Unexpected error {e}"),
    }

    // Two spaces after the script name makes the stage empty and the date wrong
    assert!(read_timelog("a  b Tue Jan 02 15:04:05 UTC 2024\n".as_bytes()).is_err());

    // Fields are separated by single spaces, also before the date
    assert!(read_timelog("a b  Tue Jan 02 15:04:05 UTC 2024\n".as_bytes()).is_err());

    // Weekday names are abbreviated
    assert!(read_timelog("a b Tuesday Jan 02 15:04:05 UTC 2024\n".as_bytes()).is_err());
}

#[test]
fn test_parse_timelog() {
    let x = parse_timelog("sar_test_data/timelog.txt").unwrap();
    assert!(x.len() == 4);
    assert!(x[0].script == "setup" && x[0].stage == "start");
    assert!(x[3].stage == "done");
    assert!(x[0].timestamp == timestamp_from_ymdhms(2013, 6, 7, 21, 38, 12).unwrap());
    assert!(find_stage(&x, "compile").unwrap().script == "build");
    assert!(find_stage(&x, "deploy").is_none());

    // Stage start times relative to the start of the run
    let elapsed = crate::timefix::elapsed_times(&x, Some(&x[0].timestamp));
    assert!(elapsed[0] == 0.0);
    assert!(elapsed[1] == 98.0);

    assert!(parse_timelog("sar_test_data/no_such_file.txt").is_err());
}
