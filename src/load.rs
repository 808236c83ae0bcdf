// Load all the data for one pipeline run and put the sar reports on the timelog's clock.

use crate::configs::RunConfig;
use crate::dates::Timestamp;
use crate::errors::SarError;
use crate::sarfile::{parse_sar_cpu, parse_sar_disk, parse_sar_mem, CpuSample, DiskSample, MemSample};
use crate::timefix::{fix_times, resolve_start_time, sampling_interval};
use crate::timelog::{find_stage, parse_timelog, TimelogEntry};

use anyhow::{bail, Result};

/// Everything read for one run.  All sar samples have absolute timestamps.

#[derive(Debug)]
pub struct RunData {
    pub timelog: Vec<TimelogEntry>,

    /// The timestamp the sar reports were registered against.
    pub reference: Timestamp,

    /// The sampling interval in seconds, from the CPU report.
    pub interval: i64,

    pub cpu: Vec<CpuSample<Timestamp>>,
    pub memory: Option<Vec<MemSample<Timestamp>>>,
    pub disk: Option<Vec<DiskSample<Timestamp>>>,
}

/// Read the timelog and the sar reports named by `config` and align the reports.
///
/// The reference timestamp is the first timelog entry, or the first entry for the configured
/// reference stage.  The sampling interval is taken from the CPU report and used for all reports;
/// each report's start is resolved against the same reference.
///
/// Any error from any of the files aborts the load.

pub fn load_run(config: &RunConfig) -> Result<RunData> {
    let timelog = parse_timelog(&config.timelog)?;
    let reference = match &config.reference_stage {
        Some(stage) => match find_stage(&timelog, stage) {
            Some(e) => e.timestamp,
            None => bail!(SarError::NoSuchStage(stage.clone())),
        },
        None => match timelog.first() {
            Some(e) => e.timestamp,
            None => bail!(SarError::InsufficientSamples {
                needed: 1,
                found: 0
            }),
        },
    };
    log::info!("{}: reference time {}", config.timelog.display(), reference);

    let cpu = parse_sar_cpu(&config.cpu)?;
    let interval = sampling_interval(&cpu)?;
    let start = resolve_start_time(&cpu, &reference)?;
    log::info!(
        "{}: {} samples from {} every {}s",
        config.cpu.display(),
        cpu.len(),
        start,
        interval
    );
    let cpu = fix_times(cpu, start, interval)?;

    let memory = match &config.memory {
        Some(path) => {
            let samples = parse_sar_mem(path)?;
            let start = resolve_start_time(&samples, &reference)?;
            log::info!("{}: {} samples from {}", path.display(), samples.len(), start);
            Some(fix_times(samples, start, interval)?)
        }
        None => None,
    };

    let disk = match (&config.disk, &config.device) {
        (Some(path), Some(device)) => {
            let samples = parse_sar_disk(path, device)?;
            let start = resolve_start_time(&samples, &reference)?;
            log::info!(
                "{}: {} samples for {} from {}",
                path.display(),
                samples.len(),
                device,
                start
            );
            Some(fix_times(samples, start, interval)?)
        }
        (Some(_), None) => bail!("No device for the disk report"),
        (None, _) => None,
    };

    Ok(RunData {
        timelog,
        reference,
        interval,
        cpu,
        memory,
        disk,
    })
}

#[cfg(test)]
use crate::configs::read_run_config;
#[cfg(test)]
use crate::dates::timestamp_from_ymdhms;
#[cfg(test)]
use chrono::{Duration, Timelike};

#[test]
fn test_load_run() {
    let cfg = read_run_config("sar_test_data/run.json").unwrap();
    let run = load_run(&cfg).unwrap();
    assert!(run.timelog.len() == 4);
    assert!(run.reference == timestamp_from_ymdhms(2013, 6, 7, 21, 38, 12).unwrap());
    assert!(run.interval == 10);

    let start = timestamp_from_ymdhms(2013, 6, 7, 21, 40, 3).unwrap();
    assert!(run.cpu.len() == 12);
    assert!(run.cpu[0].time == start);
    assert!(run.cpu[11].time == start + Duration::seconds(110));
    assert!(run.cpu[0].puser == 1.0);

    // The memory and disk reports start a little later than the CPU report but are on the same
    // date and hour.
    let memory = run.memory.unwrap();
    assert!(memory.len() == 12);
    assert!(memory[0].time == timestamp_from_ymdhms(2013, 6, 7, 21, 40, 4).unwrap());
    let disk = run.disk.unwrap();
    assert!(disk.len() == 12);
    assert!(disk.iter().all(|s| s.dev == "sda"));
    assert!(disk[0].time == timestamp_from_ymdhms(2013, 6, 7, 21, 40, 5).unwrap());
    assert!(disk[1].time - disk[0].time == Duration::seconds(10));
    for t in [run.cpu[0].time, memory[0].time, disk[0].time] {
        assert!(t.date() == run.reference.date() && t.hour() == run.reference.hour());
    }
}

#[test]
fn test_load_run_reference_stage() {
    let mut cfg = read_run_config("sar_test_data/run.json").unwrap();
    cfg.memory = None;
    cfg.disk = None;

    // The "done" stage is in the next hour, so everything moves an hour ahead.
    cfg.reference_stage = Some("done".to_string());
    let run = load_run(&cfg).unwrap();
    assert!(run.reference == timestamp_from_ymdhms(2013, 6, 7, 22, 2, 40).unwrap());
    assert!(run.cpu[0].time == timestamp_from_ymdhms(2013, 6, 7, 22, 40, 3).unwrap());
    assert!(run.memory.is_none() && run.disk.is_none());

    cfg.reference_stage = Some("deploy".to_string());
    let e = load_run(&cfg).unwrap_err();
    assert!(e.downcast_ref::<SarError>() == Some(&SarError::NoSuchStage("deploy".to_string())));
}

#[test]
fn test_load_run_errors() {
    let cfg = read_run_config("sar_test_data/run.json").unwrap();

    // Empty timelog
    let dir = tempfile::tempdir().unwrap();
    let empty = dir.path().join("empty.txt");
    std::fs::write(&empty, "\n").unwrap();
    let mut bad = cfg.clone();
    bad.timelog = empty;
    let e = load_run(&bad).unwrap_err();
    assert!(matches!(
        e.downcast_ref::<SarError>(),
        Some(SarError::InsufficientSamples { .. })
    ));

    // Missing file
    let mut bad = cfg.clone();
    bad.memory = Some(dir.path().join("nonesuch.gz"));
    assert!(load_run(&bad).is_err());

    // A report with a single sample has no interval
    let one = dir.path().join("one.txt");
    std::fs::write(&one, "a\n\nb\n09:40:03 PM all 1.0 0.0 2.0 0.0 0.0 97.0\n").unwrap();
    let mut bad = cfg.clone();
    bad.cpu = one;
    let e = load_run(&bad).unwrap_err();
    assert!(matches!(
        e.downcast_ref::<SarError>(),
        Some(SarError::InsufficientSamples { needed: 2, found: 1 })
    ));
}
