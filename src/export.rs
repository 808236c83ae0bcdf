// Write time-aligned samples as CSV, one row per sample, for plotting or further processing.
//
// The columns are `elapsed` (seconds relative to the origin, or since the epoch if there is no
// origin), `time` (the sample's timestamp), and then the sample's own fields in the order they are
// declared in the sample struct.

use crate::dates::{format_timestamp, make_time, Timestamp};
use crate::sarfile::{CpuSample, DiskSample, MemSample};
use crate::timefix::Stamped;

use anyhow::Result;
use std::io::Write;

/// A sample kind that knows its own column names and can render its fields.  `values` must
/// produce exactly one string per name in `columns`.

pub trait SeriesRecord: Stamped {
    fn columns() -> &'static [&'static str];
    fn values(&self) -> Vec<String>;
}

impl SeriesRecord for CpuSample<Timestamp> {
    fn columns() -> &'static [&'static str] {
        &["cpu", "user", "nice", "system", "iowait", "steal", "idle"]
    }

    fn values(&self) -> Vec<String> {
        let mut vs = vec![self.cpu.clone()];
        for v in [self.puser, self.pnice, self.psystem, self.piowait, self.psteal, self.pidle] {
            vs.push(v.to_string());
        }
        vs
    }
}

impl SeriesRecord for MemSample<Timestamp> {
    fn columns() -> &'static [&'static str] {
        &[
            "kbmemfree",
            "kbmemused",
            "memused",
            "kbbuffers",
            "kbcached",
            "kbcommit",
            "commit",
            "kbactive",
            "kbinact",
        ]
    }

    fn values(&self) -> Vec<String> {
        [
            self.kbmemfree,
            self.kbmemused,
            self.pmemused,
            self.kbbuffers,
            self.kbcached,
            self.kbcommit,
            self.pcommit,
            self.kbactive,
            self.kbinact,
        ]
        .iter()
        .map(|v| v.to_string())
        .collect()
    }
}

impl SeriesRecord for DiskSample<Timestamp> {
    fn columns() -> &'static [&'static str] {
        &["dev", "tps", "rd_sec", "wr_sec", "avgrqsz", "avgqusz", "await", "svctm", "util"]
    }

    fn values(&self) -> Vec<String> {
        let mut vs = vec![self.dev.clone()];
        for v in [
            self.tps,
            self.reads,
            self.writes,
            self.avgrqsz,
            self.avgqusz,
            self.await_ms,
            self.svctm,
            self.putil,
        ] {
            vs.push(v.to_string());
        }
        vs
    }
}

/// Write a header row and then one row per sample to `output`.  An empty `samples` produces just
/// the header.

pub fn write_series<W: Write, S: SeriesRecord>(
    output: W,
    samples: &[S],
    origin: Option<&Timestamp>,
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(output);

    let mut header = vec!["elapsed", "time"];
    header.extend_from_slice(S::columns());
    writer.write_record(&header)?;

    for s in samples {
        let t = s.timestamp();
        let mut row = vec![make_time(&t, origin).to_string(), format_timestamp(&t)];
        row.extend(s.values());
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
use crate::dates::timestamp_from_ymdhms;

#[test]
fn test_write_series() {
    let start = timestamp_from_ymdhms(2013, 6, 7, 21, 40, 3).unwrap();
    let samples = vec![
        CpuSample {
            time: start,
            cpu: "all".to_string(),
            puser: 1.0,
            pnice: 0.0,
            psystem: 2.5,
            piowait: 0.0,
            psteal: 0.0,
            pidle: 96.5,
        },
        CpuSample {
            time: start + chrono::Duration::seconds(10),
            cpu: "all".to_string(),
            puser: 3.0,
            pnice: 0.0,
            psystem: 2.0,
            piowait: 0.25,
            psteal: 0.0,
            pidle: 94.75,
        },
    ];
    let mut out = vec![];
    write_series(&mut out, &samples, Some(&start)).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(
        text == "\
elapsed,time,cpu,user,nice,system,iowait,steal,idle
0,2013-06-07T21:40:03,all,1,0,2.5,0,0,96.5
10,2013-06-07T21:40:13,all,3,0,2,0.25,0,94.75
"
    );

    // Without an origin the elapsed time is relative to the epoch
    let mut out = vec![];
    write_series(&mut out, &samples[..1], None).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.lines().nth(1).unwrap().starts_with("1370641203,"));
}

#[test]
fn test_write_series_columns() {
    let t = timestamp_from_ymdhms(2013, 6, 7, 21, 40, 4).unwrap();
    let mem = MemSample {
        time: t,
        kbmemfree: 1.0,
        kbmemused: 2.0,
        pmemused: 3.0,
        kbbuffers: 4.0,
        kbcached: 5.0,
        kbcommit: 6.0,
        pcommit: 7.0,
        kbactive: 8.0,
        kbinact: 9.0,
    };
    assert!(mem.values().len() == MemSample::<Timestamp>::columns().len());
    let disk = DiskSample {
        time: t,
        dev: "sda".to_string(),
        tps: 1.0,
        reads: 2.0,
        writes: 3.0,
        avgrqsz: 4.0,
        avgqusz: 5.0,
        await_ms: 6.0,
        svctm: 7.0,
        putil: 8.0,
    };
    assert!(disk.values().len() == DiskSample::<Timestamp>::columns().len());

    let mut out = vec![];
    write_series(&mut out, &[disk], None).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("elapsed,time,dev,tps,rd_sec,"));
    assert!(text.lines().nth(1).unwrap().ends_with(",2013-06-07T21:40:04,sda,1,2,3,4,5,6,7,8"));

    // Header only
    let mut out = vec![];
    write_series::<_, MemSample<Timestamp>>(&mut out, &[], None).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.lines().count() == 1);
    assert!(text.trim_end().split(',').count() == 2 + MemSample::<Timestamp>::columns().len());
}
