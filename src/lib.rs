// This library reads the text reports written by `sar` during a pipeline run, along with the
// timelog the pipeline scripts write as they move between stages, and puts them on a common clock.
//
// sar prints only a time of day.  The timelog has full dates, so a timelog entry is used as the
// reference and the sar samples are given absolute timestamps from it, assuming a fixed sampling
// interval.  See timefix.rs for the details and the limitations of that.
//
// Input files may be plain or gzipped.

mod configs;
mod dates;
mod errors;
mod export;
mod input;
mod load;
mod sarfile;
mod timefix;
mod timelog;

// Timestamps and the two kinds of time found in the input.

pub use dates::format_timestamp;
pub use dates::make_time;
pub use dates::parse_sartime;
pub use dates::parse_timelog_date;
pub use dates::timestamp_from_ymdhms;
pub use dates::Meridiem;
pub use dates::SarTime;
pub use dates::Timestamp;

// Every error raised by the library for bad input is a SarError inside an anyhow::Error; I/O and
// json errors are passed through as they are.

pub use errors::SarError;

// Open a possibly-gzipped file for line-oriented reading.

pub use input::open_report;

// Parse a timelog into entries and look up stages.

pub use timelog::find_stage;
pub use timelog::parse_timelog;
pub use timelog::read_timelog;
pub use timelog::TimelogEntry;

// Parse sar reports from files or readers.  The samples' times are the time of day as printed.

pub use sarfile::parse_sar_cpu;
pub use sarfile::parse_sar_disk;
pub use sarfile::parse_sar_mem;
pub use sarfile::read_sar_cpu;
pub use sarfile::read_sar_disk;
pub use sarfile::read_sar_mem;
pub use sarfile::CpuSample;
pub use sarfile::DiskSample;
pub use sarfile::MemSample;

// Turn times of day into timestamps.

pub use timefix::elapsed_times;
pub use timefix::fix_times;
pub use timefix::resolve_start_time;
pub use timefix::sampling_interval;
pub use timefix::Contiguous;
pub use timefix::SarRecord;
pub use timefix::Stamped;

// Describe a run in a json file and load and align all of its data in one go.

pub use configs::read_run_config;
pub use configs::RunConfig;
pub use load::load_run;
pub use load::RunData;

// Write aligned samples as CSV.

pub use export::write_series;
pub use export::SeriesRecord;
