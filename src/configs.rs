// Read the description of one pipeline run from a json file.
//
// The file format is an object { ... } with the following named fields and value types:
//
//   timelog - string, the path of the timelog written by the pipeline scripts
//   cpu - string, the path of the `sar -u` report
//   memory - string, optional, the path of the `sar -r` report
//   disk - string, optional, the path of the `sar -d` report
//   device - string, the device to extract from the disk report; required if `disk` is present
//   reference_stage - string, optional, the timelog stage whose timestamp anchors the sar data;
//      by default it is the first entry in the timelog
//
// Relative paths are relative to the directory holding the json file.  Other fields are ignored,
// so names starting with '#' can be used for comments.
//
// See sar_test_data/run.json for an example.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

// See above comment block for field documentation.

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    pub timelog: PathBuf,
    pub cpu: PathBuf,
    pub memory: Option<PathBuf>,
    pub disk: Option<PathBuf>,
    pub device: Option<String>,
    pub reference_stage: Option<String>,
}

pub fn read_run_config<P: AsRef<Path>>(filename: P) -> Result<RunConfig> {
    let filename = filename.as_ref();
    let file = File::open(filename)?;
    let reader = BufReader::new(file);
    let mut cfg: RunConfig = serde_json::from_reader(reader)?;
    if cfg.disk.is_some() && cfg.device.is_none() {
        bail!("Field 'device' must be present when 'disk' is present");
    }

    let base = filename.parent().unwrap_or(Path::new(""));
    cfg.timelog = base.join(&cfg.timelog);
    cfg.cpu = base.join(&cfg.cpu);
    cfg.memory = cfg.memory.map(|p| base.join(p));
    cfg.disk = cfg.disk.map(|p| base.join(p));
    log::debug!("{}: {:?}", filename.display(), cfg);
    Ok(cfg)
}

#[test]
fn test_config() {
    let cfg = read_run_config("sar_test_data/run.json").unwrap();
    assert!(cfg.timelog == Path::new("sar_test_data/timelog.txt"));
    assert!(cfg.cpu == Path::new("sar_test_data/sar-cpu.txt"));
    assert!(cfg.memory == Some(PathBuf::from("sar_test_data/sar-mem.txt")));
    assert!(cfg.disk == Some(PathBuf::from("sar_test_data/sar-disk.txt")));
    assert!(cfg.device.as_deref() == Some("sda"));
    assert!(cfg.reference_stage.is_none());
}

#[test]
fn test_config_errors() {
    let dir = tempfile::tempdir().unwrap();
    let write = |name: &str, text: &str| {
        let p = dir.path().join(name);
        std::fs::write(&p, text).unwrap();
        p
    };

    // Minimal config, absolute paths are kept
    let p = write("min.json", r##"{"timelog": "/x/t.txt", "cpu": "c.gz", "# note": 1}"##);
    let cfg = read_run_config(&p).unwrap();
    assert!(cfg.timelog == Path::new("/x/t.txt"));
    assert!(cfg.cpu == dir.path().join("c.gz"));
    assert!(cfg.memory.is_none() && cfg.disk.is_none());

    // Missing required fields
    let p = write("nocpu.json", r#"{"timelog": "t.txt"}"#);
    assert!(read_run_config(&p).is_err());

    // Disk without device
    let p = write("nodev.json", r#"{"timelog": "t.txt", "cpu": "c", "disk": "d"}"#);
    assert!(read_run_config(&p).is_err());

    // Wrong type, not json, no file
    let p = write("badtype.json", r#"{"timelog": 7, "cpu": "c"}"#);
    assert!(read_run_config(&p).is_err());
    let p = write("notjson.json", "timelog = t.txt");
    assert!(read_run_config(&p).is_err());
    assert!(read_run_config(dir.path().join("nonesuch.json")).is_err());
}
