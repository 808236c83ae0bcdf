// Reconstruct absolute timestamps for sar samples.
//
// sar's text output has a time of day but no date and no timezone.  We register it against a
// timestamp we trust (usually the first timelog entry of the pipeline run), and then assume that
// sar sampled at a fixed interval, which we infer from the first two samples:
//
// - `sampling_interval` computes the interval in seconds from the first two samples
// - `resolve_start_time` turns the first sample's time of day into a full timestamp
// - `fix_times` replaces every sample's time of day with start + i * interval
//
// This is an approximation with known holes, none of which are detected:
//
// - the start is assumed to be in the same hour of the same day as the reference, so if sar was
//   started in a different hour then every timestamp is off by whole hours
// - the first two samples must be in the same clock hour (this one is checked)
// - samples are assumed evenly spaced with none missing; after the first sample the timeline is
//   synthetic and any jitter or gaps in the report are lost

use crate::dates::{make_time, parse_sartime, SarTime, Timestamp};
use crate::errors::SarError;

use anyhow::{bail, Result};
use chrono::{Duration, Timelike};

/// A sample whose time is a sar time of day and that can be rebuilt with a full timestamp.

pub trait SarRecord: Sized {
    /// The same record with a Timestamp for its time.
    type Fixed;

    fn time_of_day(&self) -> &str;

    /// Consume the record and return a copy with `t` for its time and everything else unchanged.
    fn with_timestamp(self, t: Timestamp) -> Self::Fixed;
}

/// Marker for report kinds where every retained row is a sample and consecutive rows are
/// consecutive in time, so that the first two rows tell us the sampling interval.  Reports that are
/// filtered (per-device disk reports) must not implement this; use the interval from a companion
/// CPU or memory report for them.

pub trait Contiguous: SarRecord {}

/// A record with an absolute timestamp.

pub trait Stamped {
    fn timestamp(&self) -> Timestamp;
}

/// Compute the sampling interval in seconds from the first two samples.
///
/// The two samples must be in the same clock hour; this code does not handle the rollover.  The
/// result can be zero or negative if the samples are not in order, and that is not checked.

pub fn sampling_interval<S: Contiguous>(samples: &[S]) -> Result<i64> {
    if samples.len() < 2 {
        bail!(SarError::InsufficientSamples {
            needed: 2,
            found: samples.len()
        });
    }
    let t1 = sample_time(&samples[0])?;
    let t2 = sample_time(&samples[1])?;
    if !t1.same_hour(&t2) {
        bail!(SarError::HourBoundaryViolation {
            first: samples[0].time_of_day().to_string(),
            second: samples[1].time_of_day().to_string(),
        });
    }
    Ok((t2.minute as i64 - t1.minute as i64) * 60 + (t2.second as i64 - t1.second as i64))
}

/// Register the first sample against `reference`: the result has the reference's date and hour and
/// the sample's minute and second.  The sample's hour is ignored.

pub fn resolve_start_time<S: SarRecord>(samples: &[S], reference: &Timestamp) -> Result<Timestamp> {
    let Some(first) = samples.first() else {
        bail!(SarError::InsufficientSamples {
            needed: 1,
            found: 0
        });
    };
    let t = sample_time(first)?;
    match reference.date().and_hms_opt(reference.hour(), t.minute, t.second) {
        Some(start) => Ok(start),
        None => bail!(SarError::TimeOfDay(first.time_of_day().to_string())),
    }
}

/// Replace the time of day of every sample by `start + i * interval` seconds, where i is the
/// sample's position.  The result has the same length and order as the input.
///
/// Fails only if some `start + i * interval` is not a representable timestamp.

pub fn fix_times<S: SarRecord>(
    samples: Vec<S>,
    start: Timestamp,
    interval: i64,
) -> Result<Vec<S::Fixed>> {
    let mut fixed = Vec::with_capacity(samples.len());
    for (i, s) in samples.into_iter().enumerate() {
        let t = interval
            .checked_mul(i as i64)
            .and_then(Duration::try_seconds)
            .and_then(|d| start.checked_add_signed(d));
        let Some(t) = t else {
            bail!(SarError::TimeOutOfRange { index: i, interval });
        };
        fixed.push(s.with_timestamp(t));
    }
    Ok(fixed)
}

/// The timestamps of the samples as seconds, relative to `start` if present and to the Unix epoch
/// otherwise.  Useful as the x axis of a plot.

pub fn elapsed_times<S: Stamped>(samples: &[S], start: Option<&Timestamp>) -> Vec<f64> {
    samples
        .iter()
        .map(|s| make_time(&s.timestamp(), start))
        .collect()
}

fn sample_time<S: SarRecord>(sample: &S) -> Result<SarTime> {
    match parse_sartime(sample.time_of_day()) {
        Some(t) => Ok(t),
        None => bail!(SarError::TimeOfDay(sample.time_of_day().to_string())),
    }
}

#[cfg(test)]
use crate::dates::timestamp_from_ymdhms;
#[cfg(test)]
use crate::sarfile::{CpuSample, DiskSample, MemSample};

#[cfg(test)]
fn cpu(time: &str, puser: f64) -> CpuSample<String> {
    CpuSample {
        time: time.to_string(),
        cpu: "all".to_string(),
        puser,
        pnice: 0.0,
        psystem: 0.0,
        piowait: 0.0,
        psteal: 0.0,
        pidle: 100.0 - puser,
    }
}

#[cfg(test)]
fn mem(time: &str) -> MemSample<String> {
    MemSample {
        time: time.to_string(),
        kbmemfree: 1.0,
        kbmemused: 2.0,
        pmemused: 66.0,
        kbbuffers: 3.0,
        kbcached: 4.0,
        kbcommit: 5.0,
        pcommit: 6.0,
        kbactive: 7.0,
        kbinact: 8.0,
    }
}

#[cfg(test)]
fn disk(time: &str) -> DiskSample<String> {
    DiskSample {
        time: time.to_string(),
        dev: "sda".to_string(),
        tps: 1.0,
        reads: 2.0,
        writes: 3.0,
        avgrqsz: 4.0,
        avgqusz: 5.0,
        await_ms: 6.0,
        svctm: 7.0,
        putil: 8.0,
    }
}

#[test]
fn test_sampling_interval() {
    let x = vec![cpu("09:40:03 PM", 1.0), cpu("09:40:13 PM", 2.0)];
    assert!(sampling_interval(&x).unwrap() == 10);

    let x = vec![cpu("09:40:53 PM", 1.0), cpu("09:42:03 PM", 2.0), cpu("11:00:00 PM", 3.0)];
    assert!(sampling_interval(&x).unwrap() == 70);

    let x = vec![mem("10:00:00 AM"), mem("10:59:59 AM")];
    assert!(sampling_interval(&x).unwrap() == 3599);

    // (m2-m1)*60 + (s2-s1), including zero and negative results.
    for (m1, s1, m2, s2) in [(0, 0, 0, 0), (5, 30, 5, 45), (59, 59, 0, 0), (1, 0, 0, 59)] {
        let x = vec![
            cpu(&format!("03:{m1:02}:{s1:02} AM"), 0.0),
            cpu(&format!("03:{m2:02}:{s2:02} AM"), 0.0),
        ];
        assert!(sampling_interval(&x).unwrap() == (m2 - m1) * 60 + (s2 - s1));
    }
}

#[test]
fn test_sampling_interval_errors() {
    let e = sampling_interval::<CpuSample<String>>(&[]).unwrap_err();
    assert!(
        e.downcast_ref::<SarError>()
            == Some(&SarError::InsufficientSamples {
                needed: 2,
                found: 0
            })
    );

    let e = sampling_interval(&[cpu("09:40:03 PM", 1.0)]).unwrap_err();
    assert!(
        e.downcast_ref::<SarError>()
            == Some(&SarError::InsufficientSamples {
                needed: 2,
                found: 1
            })
    );

    let e = sampling_interval(&[cpu("09:59:53 PM", 1.0), cpu("10:00:03 PM", 1.0)]).unwrap_err();
    assert!(
        e.downcast_ref::<SarError>()
            == Some(&SarError::HourBoundaryViolation {
                first: "09:59:53 PM".to_string(),
                second: "10:00:03 PM".to_string()
            })
    );

    // Same hour number, other half of the day
    let e = sampling_interval(&[cpu("09:40:03 AM", 1.0), cpu("09:40:13 PM", 1.0)]).unwrap_err();
    assert!(matches!(
        e.downcast_ref::<SarError>(),
        Some(SarError::HourBoundaryViolation { .. })
    ));

    let e = sampling_interval(&[cpu("9.40.03 PM", 1.0), cpu("09:40:13 PM", 1.0)]).unwrap_err();
    assert!(e.downcast_ref::<SarError>() == Some(&SarError::TimeOfDay("9.40.03 PM".to_string())));
}

#[test]
fn test_resolve_start_time() {
    let reference = timestamp_from_ymdhms(2013, 6, 7, 21, 38, 12).unwrap();
    let x = vec![cpu("09:40:03 PM", 1.0), cpu("09:40:13 PM", 2.0)];
    let start = resolve_start_time(&x, &reference).unwrap();
    assert!(start == timestamp_from_ymdhms(2013, 6, 7, 21, 40, 3).unwrap());
    // Same inputs, same answer
    assert!(resolve_start_time(&x, &reference).unwrap() == start);

    // The sample's hour is discarded, even when it disagrees with the reference.  Also works for
    // disk samples.
    let x = vec![disk("03:05:59 AM")];
    let start = resolve_start_time(&x, &reference).unwrap();
    assert!(start == timestamp_from_ymdhms(2013, 6, 7, 21, 5, 59).unwrap());

    let e = resolve_start_time::<MemSample<String>>(&[], &reference).unwrap_err();
    assert!(
        e.downcast_ref::<SarError>()
            == Some(&SarError::InsufficientSamples {
                needed: 1,
                found: 0
            })
    );
    assert!(resolve_start_time(&[disk("bogus")], &reference).is_err());
}

#[test]
fn test_fix_times() {
    let start = timestamp_from_ymdhms(2013, 6, 7, 21, 40, 3).unwrap();
    let x = vec![
        cpu("09:40:03 PM", 1.0),
        cpu("09:40:13 PM", 2.0),
        cpu("09:40:23 PM", 3.0),
        cpu("09:40:33 PM", 4.0),
    ];
    let fixed = fix_times(x.clone(), start, 10).unwrap();
    assert!(fixed.len() == 4);
    assert!(fixed[0].time == start);
    assert!(fixed[3].time == timestamp_from_ymdhms(2013, 6, 7, 21, 40, 33).unwrap());
    for (a, b) in fixed.iter().zip(fixed.iter().skip(1)) {
        assert!(b.time - a.time == Duration::seconds(10));
    }
    // Everything but the time is carried over, in order.
    for (orig, new) in x.into_iter().zip(fixed.into_iter()) {
        let t = new.time;
        assert!(orig.with_time(t) == new);
    }

    // The rewritten timeline is synthetic: gaps in the report are not noticed, and it crosses
    // midnight without trouble.
    let start = timestamp_from_ymdhms(2013, 6, 7, 23, 59, 50).unwrap();
    let x = vec![disk("11:59:50 PM"), disk("11:59:55 PM"), disk("12:30:00 AM")];
    let fixed = fix_times(x, start, 10).unwrap();
    assert!(fixed[1].time == timestamp_from_ymdhms(2013, 6, 8, 0, 0, 0).unwrap());
    assert!(fixed[2].time == timestamp_from_ymdhms(2013, 6, 8, 0, 0, 10).unwrap());

    assert!(fix_times(Vec::<MemSample<String>>::new(), start, 10).unwrap().is_empty());
}

#[test]
fn test_fix_times_out_of_range() {
    let start = timestamp_from_ymdhms(2013, 6, 7, 21, 40, 3).unwrap();

    // The first sample is always at the start, whatever the interval.
    let fixed = fix_times(vec![mem("x")], start, i64::MAX).unwrap();
    assert!(fixed[0].time == start);

    // Too far in the future to be a timestamp
    let e = fix_times(vec![mem("x"), mem("y")], start, i64::MAX / 1000).unwrap_err();
    assert!(
        e.downcast_ref::<SarError>()
            == Some(&SarError::TimeOutOfRange {
                index: 1,
                interval: i64::MAX / 1000
            })
    );

    // Too large for a duration, in either direction
    for interval in [i64::MAX, i64::MIN / 2] {
        let e = fix_times(vec![disk("a"), disk("b"), disk("c")], start, interval).unwrap_err();
        assert!(matches!(
            e.downcast_ref::<SarError>(),
            Some(SarError::TimeOutOfRange { index: 1, .. })
        ));
    }
}

#[test]
fn test_elapsed_times() {
    let start = timestamp_from_ymdhms(2013, 6, 7, 21, 40, 3).unwrap();
    let reference = timestamp_from_ymdhms(2013, 6, 7, 21, 38, 12).unwrap();
    let fixed = fix_times(vec![mem("x"), mem("y"), mem("z")], start, 10).unwrap();
    assert!(elapsed_times(&fixed, Some(&start)) == vec![0.0, 10.0, 20.0]);
    assert!(elapsed_times(&fixed, Some(&reference)) == vec![111.0, 121.0, 131.0]);
    assert!(elapsed_times(&fixed, None)[0] == make_time(&start, None));
}
