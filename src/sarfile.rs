// Parsers for the text reports written by `sar` (sysstat), one per report kind:
//
//   sar -u   CPU        time ampm CPU %user %nice %system %iowait %steal %idle
//   sar -r   memory     time ampm kbmemfree kbmemused %memused kbbuffers kbcached kbcommit %commit
//                                 kbactive kbinact [kbdirty ...]
//   sar -d   disk       time ampm DEV tps rd_sec/s wr_sec/s avgrq-sz avgqu-sz await svctm %util
//
// A report looks like this:
//
//   Linux 3.2.0-4-amd64 (myhost)    06/07/2013      _x86_64_        (4 CPU)
//
//   09:40:03 PM     CPU     %user     %nice   %system   %iowait    %steal     %idle
//   09:40:13 PM     all      1.00      0.00      2.00      0.00      0.00     97.00
//   ...
//   Average:        all      1.05      0.00      2.00      0.10      0.00     96.85
//
// The first three lines are the banner, a blank line, and the column header.  sar repeats the
// column header from time to time (after a blank line), and ends with one or more "Average" rows.
// Those are all skipped, as are blank lines.  Everything else must be a well-formed data row; a row
// with the wrong number of fields or a bad number aborts the parse.
//
// NOTE:
//
// - sar prints the time with the locale's clock.  We require the 12-hour "HH:MM:SS AM" form, which
//   is two fields; a 24-hour report has one field fewer per row and is rejected.
//
// - Newer sysstat versions have different columns in the memory and disk reports (kbavail,
//   rkB/s, etc).  The memory report is accepted as long as there are enough fields, but the values
//   will then be assigned to the wrong names.

use crate::dates::{parse_sartime, Timestamp};
use crate::errors::SarError;
use crate::input::open_report;
use crate::timefix::{Contiguous, SarRecord, Stamped};

use anyhow::{bail, Result};
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

/// One row of `sar -u`.  `T` is the type of the time field: the time of day as read (String), or
/// the reconstructed Timestamp.

#[derive(Debug, Clone, PartialEq)]
pub struct CpuSample<T> {
    pub time: T,
    /// "all" or the core number.
    pub cpu: String,
    pub puser: f64,
    pub pnice: f64,
    pub psystem: f64,
    pub piowait: f64,
    pub psteal: f64,
    pub pidle: f64,
}

/// One row of `sar -r`.  Any columns after kbinact are dropped.

#[derive(Debug, Clone, PartialEq)]
pub struct MemSample<T> {
    pub time: T,
    pub kbmemfree: f64,
    pub kbmemused: f64,
    pub pmemused: f64,
    pub kbbuffers: f64,
    pub kbcached: f64,
    pub kbcommit: f64,
    pub pcommit: f64,
    pub kbactive: f64,
    pub kbinact: f64,
}

/// One row of `sar -d` for a single device.

#[derive(Debug, Clone, PartialEq)]
pub struct DiskSample<T> {
    pub time: T,
    pub dev: String,
    pub tps: f64,
    /// Sectors read per second.
    pub reads: f64,
    /// Sectors written per second.
    pub writes: f64,
    pub avgrqsz: f64,
    pub avgqusz: f64,
    /// Average time for I/O requests, in milliseconds.  (`await` is a keyword.)
    pub await_ms: f64,
    pub svctm: f64,
    pub putil: f64,
}

impl<T> CpuSample<T> {
    /// A copy of the sample with a different time.
    pub fn with_time<U>(self, time: U) -> CpuSample<U> {
        CpuSample {
            time,
            cpu: self.cpu,
            puser: self.puser,
            pnice: self.pnice,
            psystem: self.psystem,
            piowait: self.piowait,
            psteal: self.psteal,
            pidle: self.pidle,
        }
    }
}

impl<T> MemSample<T> {
    pub fn with_time<U>(self, time: U) -> MemSample<U> {
        MemSample {
            time,
            kbmemfree: self.kbmemfree,
            kbmemused: self.kbmemused,
            pmemused: self.pmemused,
            kbbuffers: self.kbbuffers,
            kbcached: self.kbcached,
            kbcommit: self.kbcommit,
            pcommit: self.pcommit,
            kbactive: self.kbactive,
            kbinact: self.kbinact,
        }
    }
}

impl<T> DiskSample<T> {
    pub fn with_time<U>(self, time: U) -> DiskSample<U> {
        DiskSample {
            time,
            dev: self.dev,
            tps: self.tps,
            reads: self.reads,
            writes: self.writes,
            avgrqsz: self.avgrqsz,
            avgqusz: self.avgqusz,
            await_ms: self.await_ms,
            svctm: self.svctm,
            putil: self.putil,
        }
    }
}

impl SarRecord for CpuSample<String> {
    type Fixed = CpuSample<Timestamp>;

    fn time_of_day(&self) -> &str {
        &self.time
    }

    fn with_timestamp(self, t: Timestamp) -> Self::Fixed {
        self.with_time(t)
    }
}

impl SarRecord for MemSample<String> {
    type Fixed = MemSample<Timestamp>;

    fn time_of_day(&self) -> &str {
        &self.time
    }

    fn with_timestamp(self, t: Timestamp) -> Self::Fixed {
        self.with_time(t)
    }
}

impl SarRecord for DiskSample<String> {
    type Fixed = DiskSample<Timestamp>;

    fn time_of_day(&self) -> &str {
        &self.time
    }

    fn with_timestamp(self, t: Timestamp) -> Self::Fixed {
        self.with_time(t)
    }
}

// The CPU and memory reports have one row per sample (for `sar -u` without -P, anyway), so
// consecutive rows are consecutive samples.  The disk report has one row per device per sample and
// we keep only one device, so it does not qualify.

impl Contiguous for CpuSample<String> {}
impl Contiguous for MemSample<String> {}

impl Stamped for CpuSample<Timestamp> {
    fn timestamp(&self) -> Timestamp {
        self.time
    }
}

impl Stamped for MemSample<Timestamp> {
    fn timestamp(&self) -> Timestamp {
        self.time
    }
}

impl Stamped for DiskSample<Timestamp> {
    fn timestamp(&self) -> Timestamp {
        self.time
    }
}

/// Parse a `sar -u` report, possibly gzipped.

pub fn parse_sar_cpu<P: AsRef<Path>>(file_name: P) -> Result<Vec<CpuSample<String>>> {
    let samples = read_sar_cpu(open_report(file_name.as_ref())?)?;
    log::debug!("{}: {} cpu samples", file_name.as_ref().display(), samples.len());
    Ok(samples)
}

/// Parse a `sar -r` report, possibly gzipped.

pub fn parse_sar_mem<P: AsRef<Path>>(file_name: P) -> Result<Vec<MemSample<String>>> {
    let samples = read_sar_mem(open_report(file_name.as_ref())?)?;
    log::debug!("{}: {} memory samples", file_name.as_ref().display(), samples.len());
    Ok(samples)
}

/// Parse a `sar -d` report, possibly gzipped, keeping only the rows for `device`.  The name must
/// match the DEV column exactly, so it's "dev8-0" or "sda" depending on whether sar was run with
/// -p.

pub fn parse_sar_disk<P: AsRef<Path>>(file_name: P, device: &str) -> Result<Vec<DiskSample<String>>> {
    let samples = read_sar_disk(open_report(file_name.as_ref())?, device)?;
    log::debug!(
        "{}: {} disk samples for {}",
        file_name.as_ref().display(),
        samples.len(),
        device
    );
    Ok(samples)
}

pub fn read_sar_cpu<R: BufRead>(reader: R) -> Result<Vec<CpuSample<String>>> {
    let mut samples = vec![];
    read_rows(reader, &CPU_REPORT, |line, fields| {
        let v = get_f64s(line, &fields[3..9])?;
        samples.push(CpuSample {
            time: get_time(line, fields)?,
            cpu: fields[2].to_string(),
            puser: v[0],
            pnice: v[1],
            psystem: v[2],
            piowait: v[3],
            psteal: v[4],
            pidle: v[5],
        });
        Ok(())
    })?;
    Ok(samples)
}

pub fn read_sar_mem<R: BufRead>(reader: R) -> Result<Vec<MemSample<String>>> {
    let mut samples = vec![];
    read_rows(reader, &MEM_REPORT, |line, fields| {
        let v = get_f64s(line, &fields[2..11])?;
        samples.push(MemSample {
            time: get_time(line, fields)?,
            kbmemfree: v[0],
            kbmemused: v[1],
            pmemused: v[2],
            kbbuffers: v[3],
            kbcached: v[4],
            kbcommit: v[5],
            pcommit: v[6],
            kbactive: v[7],
            kbinact: v[8],
        });
        Ok(())
    })?;
    Ok(samples)
}

pub fn read_sar_disk<R: BufRead>(reader: R, device: &str) -> Result<Vec<DiskSample<String>>> {
    let mut samples = vec![];
    read_rows(reader, &DISK_REPORT, |line, fields| {
        if fields[2] != device {
            return Ok(());
        }
        let v = get_f64s(line, &fields[3..11])?;
        samples.push(DiskSample {
            time: get_time(line, fields)?,
            dev: fields[2].to_string(),
            tps: v[0],
            reads: v[1],
            writes: v[2],
            avgrqsz: v[3],
            avgqusz: v[4],
            await_ms: v[5],
            svctm: v[6],
            putil: v[7],
        });
        Ok(())
    })?;
    Ok(samples)
}

enum FieldCount {
    Exactly(usize),
    AtLeast(usize),
}

/// Layout of one kind of report.  `reheader` is a string that appears in the column header and
/// never in a data row.

struct ReportFormat {
    name: &'static str,
    header_lines: usize,
    reheader: &'static str,
    fields: FieldCount,
}

const CPU_REPORT: ReportFormat = ReportFormat {
    name: "cpu",
    header_lines: 3,
    reheader: "%user",
    fields: FieldCount::Exactly(9),
};

const MEM_REPORT: ReportFormat = ReportFormat {
    name: "memory",
    header_lines: 3,
    reheader: "kbmemfree",
    fields: FieldCount::AtLeast(11),
};

// Disk reports repeat their header like the others.  Without the check the repeats would mostly be
// dropped by the device filter anyway, but not when looking for a device called "DEV".

const DISK_REPORT: ReportFormat = ReportFormat {
    name: "disk",
    header_lines: 3,
    reheader: "%util",
    fields: FieldCount::Exactly(11),
};

/// Run `process` on the whitespace-separated fields of every data row in the report, in order,
/// along with the 1-based line number.  The field count has been checked when `process` is called.

fn read_rows<R, F>(reader: R, format: &ReportFormat, mut process: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(usize, &[&str]) -> Result<()>,
{
    let mut rows = 0;
    let mut skipped = 0;
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if n < format.header_lines
            || line.trim_start().starts_with("Average")
            || line.contains(format.reheader)
        {
            skipped += 1;
            continue;
        }

        let fields = line.split_whitespace().collect::<Vec<&str>>();
        let ok = match format.fields {
            FieldCount::Exactly(k) => fields.len() == k,
            FieldCount::AtLeast(k) => fields.len() >= k,
        };
        if !ok {
            bail!(SarError::MalformedRow {
                line: n + 1,
                expected: match format.fields {
                    FieldCount::Exactly(k) => format!("{k}"),
                    FieldCount::AtLeast(k) => format!("at least {k}"),
                },
                found: fields.len(),
            });
        }
        process(n + 1, &fields)?;
        rows += 1;
    }
    log::debug!("{} report: {} data rows, {} lines skipped", format.name, rows, skipped);
    Ok(())
}

// Fields 0 and 1 are the time and AM/PM.

fn get_time(line: usize, fields: &[&str]) -> Result<String> {
    let time = format!("{} {}", fields[0], fields[1]);
    if parse_sartime(&time).is_none() {
        bail!(SarError::MalformedField { line, field: time });
    }
    Ok(time)
}

fn get_f64s(line: usize, fields: &[&str]) -> Result<Vec<f64>> {
    let mut vs = Vec::with_capacity(fields.len());
    for f in fields {
        match f64::from_str(f) {
            Ok(v) => vs.push(v),
            Err(_) => {
                bail!(SarError::MalformedField {
                    line,
                    field: f.to_string()
                })
            }
        }
    }
    Ok(vs)
}

#[cfg(test)]
fn sar_error(e: &anyhow::Error) -> &SarError {
    e.downcast_ref::<SarError>().unwrap()
}

#[cfg(test)]
const CPU_HEADER: &str = "\
Linux 3.2.0-4-amd64 (myhost) \t06/07/2013 \t_x86_64_\t(4 CPU)

09:40:03 PM     CPU     %user     %nice   %system   %iowait    %steal     %idle
";

#[test]
fn test_read_sar_cpu1() {
    let text = format!(
        "{CPU_HEADER}\
09:40:03 PM all 1.0 0.0 2.0 0.0 0.0 97.0
09:40:13 PM all 1.5 0.5 2.5 0.25 0.0 95.25
Average: all 1.25 0.25 2.25 0.125 0.0 96.125
"
    );
    let x = read_sar_cpu(text.as_bytes()).unwrap();
    assert!(x.len() == 2);
    assert!(x[0].time == "09:40:03 PM");
    assert!(x[0].cpu == "all");
    assert!(x[0].puser == 1.0);
    assert!(x[0].pidle == 97.0);
    assert!(
        x[1] == CpuSample {
            time: "09:40:13 PM".to_string(),
            cpu: "all".to_string(),
            puser: 1.5,
            pnice: 0.5,
            psystem: 2.5,
            piowait: 0.25,
            psteal: 0.0,
            pidle: 95.25,
        }
    );
}

#[test]
fn test_read_sar_cpu_skips() {
    // Blank lines, repeated headers, and Average rows anywhere are skipped.  The line right after
    // the header is blank.
    let text = format!(
        "{CPU_HEADER}\n\
09:40:13 PM     all      1.00      0.00      2.00      0.00      0.00     97.00
   \t
09:40:23 PM     CPU     %user     %nice   %system   %iowait    %steal     %idle
09:40:23 PM     all      3.00      0.00      2.00      0.00      0.00     95.00
Average:        all      2.00      0.00      2.00      0.00      0.00     96.00

09:40:33 PM     all      4.00      0.00      2.00      0.00      0.00     94.00
"
    );
    assert!(text.lines().nth(3) == Some(""));
    let x = read_sar_cpu(text.as_bytes()).unwrap();
    assert!(x.iter().map(|s| s.puser).collect::<Vec<f64>>() == vec![1.0, 3.0, 4.0]);
}

#[test]
fn test_read_sar_cpu_header_count() {
    // The first three physical lines are dropped whatever they contain, and blank lines count.
    let text = "\
09:40:03 PM all 9.0 0.0 2.0 0.0 0.0 89.0

09:40:13 PM all 8.0 0.0 2.0 0.0 0.0 90.0
09:40:23 PM all 7.0 0.0 2.0 0.0 0.0 91.0
";
    let x = read_sar_cpu(text.as_bytes()).unwrap();
    assert!(x.len() == 1);
    assert!(x[0].puser == 7.0);

    // Nothing but the header
    assert!(read_sar_cpu(CPU_HEADER.as_bytes()).unwrap().is_empty());
}

#[test]
fn test_read_sar_cpu_errors() {
    // Too few fields
    let text = format!("{CPU_HEADER}09:40:13 PM all 1.0 0.0 2.0 0.0 0.0\n");
    let e = read_sar_cpu(text.as_bytes()).unwrap_err();
    assert!(
        *sar_error(&e)
            == SarError::MalformedRow {
                line: 4,
                expected: "9".to_string(),
                found: 8
            }
    );

    // Too many fields; a good row before it does not make it through.
    let text = format!(
        "{CPU_HEADER}\
09:40:13 PM all 1.0 0.0 2.0 0.0 0.0 97.0
09:40:23 PM all 1.0 0.0 2.0 0.0 0.0 97.0 1.0
"
    );
    let e = read_sar_cpu(text.as_bytes()).unwrap_err();
    assert!(matches!(sar_error(&e), SarError::MalformedRow { line: 5, found: 10, .. }));

    // Bad number
    let text = format!("{CPU_HEADER}09:40:13 PM all 1.0 0.0 2,0 0.0 0.0 97.0\n");
    let e = read_sar_cpu(text.as_bytes()).unwrap_err();
    assert!(
        *sar_error(&e)
            == SarError::MalformedField {
                line: 4,
                field: "2,0".to_string()
            }
    );

    // Bad time
    let text = format!("{CPU_HEADER}09:40 PM all 1.0 0.0 2.0 0.0 0.0 97.0\n");
    let e = read_sar_cpu(text.as_bytes()).unwrap_err();
    assert!(matches!(sar_error(&e), SarError::MalformedField { line: 4, .. }));

    // 24-hour clock
    let text = format!("{CPU_HEADER}21:40:13 all 1.0 0.0 2.0 0.0 0.0 97.0\n");
    let e = read_sar_cpu(text.as_bytes()).unwrap_err();
    assert!(matches!(sar_error(&e), SarError::MalformedRow { found: 8, .. }));
}

#[test]
fn test_read_sar_mem() {
    let text = "\
Linux 3.2.0-4-amd64 (myhost) \t06/07/2013 \t_x86_64_\t(4 CPU)

09:40:03 PM kbmemfree kbmemused  %memused kbbuffers  kbcached  kbcommit   %commit  kbactive   kbinact   kbdirty
09:40:13 PM 100 200 66.67 10 20 300 12.5 40 50 77
09:40:23 PM 101 199 66.33 10 20 300 12.5 40 50

09:40:33 PM kbmemfree kbmemused  %memused kbbuffers  kbcached  kbcommit   %commit  kbactive   kbinact   kbdirty
09:40:33 PM 102 198 66.0 10 20 300 12.5 40 50 77 88 99
Average: 101 199 66.33 10 20 300 12.5 40 50 77
";
    let x = read_sar_mem(text.as_bytes()).unwrap();
    assert!(x.len() == 3);
    assert!(
        x[0] == MemSample {
            time: "09:40:13 PM".to_string(),
            kbmemfree: 100.0,
            kbmemused: 200.0,
            pmemused: 66.67,
            kbbuffers: 10.0,
            kbcached: 20.0,
            kbcommit: 300.0,
            pcommit: 12.5,
            kbactive: 40.0,
            kbinact: 50.0,
        }
    );
    // kbdirty and anything after are dropped
    assert!(x[2].kbinact == 50.0);
    assert!(x[2].time == "09:40:33 PM");

    let text = "a\nb\nc\n09:40:13 PM 100 200 66.67 10 20 300 12.5 40\n";
    let e = read_sar_mem(text.as_bytes()).unwrap_err();
    assert!(
        *sar_error(&e)
            == SarError::MalformedRow {
                line: 4,
                expected: "at least 11".to_string(),
                found: 10
            }
    );
}

#[cfg(test)]
const DISK_REPORT_TEXT: &str = "\
Linux 3.2.0-4-amd64 (myhost) \t06/07/2013 \t_x86_64_\t(4 CPU)

09:40:03 PM       DEV       tps  rd_sec/s  wr_sec/s  avgrq-sz  avgqu-sz     await     svctm     %util
09:40:13 PM       sda      2.00      0.00     40.00     20.00      0.01      5.00      2.50      0.50
09:40:13 PM      sda1      1.00      0.00     20.00     20.00      0.00      4.00      2.00      0.20
09:40:13 PM       sdb      0.00      0.00      0.00      0.00      0.00      0.00      0.00      0.00

09:40:23 PM       DEV       tps  rd_sec/s  wr_sec/s  avgrq-sz  avgqu-sz     await     svctm     %util
09:40:23 PM       sda      4.00     16.00     40.00     14.00      0.02      6.00      3.00      1.20
09:40:23 PM      sda1      1.00      0.00     20.00     20.00      0.00      4.00      2.00      0.20
09:40:23 PM       sdb      1.00      8.00      0.00      8.00      0.00      1.00      1.00      0.10

Average:          sda      3.00      8.00     40.00     17.00      0.02      5.50      2.75      0.85
Average:         sda1      1.00      0.00     20.00     20.00      0.00      4.00      2.00      0.20
Average:          sdb      0.50      4.00      0.00      4.00      0.00      0.50      0.50      0.05
";

#[test]
fn test_read_sar_disk() {
    let x = read_sar_disk(DISK_REPORT_TEXT.as_bytes(), "sda").unwrap();
    assert!(x.len() == 2);
    assert!(x.iter().all(|s| s.dev == "sda"));
    assert!(x[0].time == "09:40:13 PM");
    assert!(x[1].time == "09:40:23 PM");
    assert!(
        x[1] == DiskSample {
            time: "09:40:23 PM".to_string(),
            dev: "sda".to_string(),
            tps: 4.0,
            reads: 16.0,
            writes: 40.0,
            avgrqsz: 14.0,
            avgqusz: 0.02,
            await_ms: 6.0,
            svctm: 3.0,
            putil: 1.2,
        }
    );

    // Exact match only
    let x = read_sar_disk(DISK_REPORT_TEXT.as_bytes(), "sda1").unwrap();
    assert!(x.len() == 2);
    assert!(x.iter().all(|s| s.dev == "sda1"));
    assert!(read_sar_disk(DISK_REPORT_TEXT.as_bytes(), "sd").unwrap().is_empty());

    // The repeated header is not mistaken for a device
    assert!(read_sar_disk(DISK_REPORT_TEXT.as_bytes(), "DEV").unwrap().is_empty());
}

#[test]
fn test_read_sar_disk_errors() {
    // The field count is checked even for rows of other devices.
    let text = "a\nb\nc\n09:40:13 PM sdb 0.00 0.00 0.00 0.00 0.00 0.00 0.00\n";
    let e = read_sar_disk(text.as_bytes(), "sda").unwrap_err();
    assert!(
        *sar_error(&e)
            == SarError::MalformedRow {
                line: 4,
                expected: "11".to_string(),
                found: 10
            }
    );

    // Numbers are only checked for the device we keep.
    let text = "a\nb\nc\n09:40:13 PM sdb x 0.00 0.00 0.00 0.00 0.00 0.00 0.00\n";
    assert!(read_sar_disk(text.as_bytes(), "sda").unwrap().is_empty());
    let e = read_sar_disk(text.as_bytes(), "sdb").unwrap_err();
    assert!(matches!(sar_error(&e), SarError::MalformedField { line: 4, .. }));
}

#[test]
fn test_parse_sar_files() {
    let cpu = parse_sar_cpu("sar_test_data/sar-cpu.txt").unwrap();
    assert!(cpu.len() == 12);
    assert!(cpu[0].time == "09:40:03 PM");
    assert!(cpu[11].time == "09:41:53 PM");

    let mem = parse_sar_mem("sar_test_data/sar-mem.txt").unwrap();
    assert!(mem.len() == 12);

    let disk = parse_sar_disk("sar_test_data/sar-disk.txt", "sda").unwrap();
    assert!(disk.len() == 12);
    let all_rows = parse_sar_disk("sar_test_data/sar-disk.txt", "sdb").unwrap();
    assert!(all_rows.len() == 12);
    assert!(parse_sar_disk("sar_test_data/sar-disk.txt", "sdc").unwrap().is_empty());

    assert!(parse_sar_cpu("sar_test_data/no_such_file.txt").is_err());
    // A memory report is not a CPU report
    assert!(parse_sar_cpu("sar_test_data/sar-mem.txt").is_err());
}

#[test]
fn test_parse_sar_gzipped() {
    // Compressed and uncompressed input give the same result.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sar-cpu.gz");
    let text = std::fs::read_to_string("sar_test_data/sar-cpu.txt").unwrap();
    crate::input::write_gzipped(&path, &text);
    assert!(parse_sar_cpu(&path).unwrap() == parse_sar_cpu("sar_test_data/sar-cpu.txt").unwrap());
}
