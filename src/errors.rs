// Errors raised while reading and aligning sar data.  These travel inside `anyhow::Error` like
// everything else in the library; use `err.downcast_ref::<SarError>()` to inspect them.

use thiserror::Error;

/// Every one of these is fatal for the operation that raised it; no partial result is returned.

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SarError {
    /// A data row had the wrong number of whitespace-separated fields.  `line` is 1-based.
    #[error("line {line}: expected {expected} fields, found {found}")]
    MalformedRow {
        line: usize,
        expected: String,
        found: usize,
    },

    /// A numeric or time-of-day field could not be parsed.
    #[error("line {line}: malformed field '{field}'")]
    MalformedField { line: usize, field: String },

    /// A timelog line did not have the form `script stage date-time`, or the date-time did not
    /// match `%a %b %d %H:%M:%S %Z %Y`.
    #[error("line {line}: bad timelog entry '{text}'")]
    TimestampFormat { line: usize, text: String },

    /// A time of day that is not `HH:MM:SS`, optionally followed by `AM` or `PM`.
    #[error("malformed time of day '{0}'")]
    TimeOfDay(String),

    #[error("need at least {needed} samples, found {found}")]
    InsufficientSamples { needed: usize, found: usize },

    /// The first two samples are not within the same hour, so the interval can't be computed.
    #[error("samples '{first}' and '{second}' are not in the same hour")]
    HourBoundaryViolation { first: String, second: String },

    /// `start + index * interval` for a sample is outside the range of timestamps.
    #[error("sample {index} at interval {interval}s is not a representable time")]
    TimeOutOfRange { index: usize, interval: i64 },

    #[error("no timelog entry for stage '{0}'")]
    NoSuchStage(String),
}
