// Open report files for reading.  sar reports are usually archived gzipped and timelogs usually are
// not, but either may be either, so look at the content and not at the name.

use anyhow::Result;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open `path` for line-oriented reading, decompressing it on the fly if it is gzipped.  The file
/// and any decoder belong to the returned reader and are closed when it is dropped.

pub fn open_report<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::new(file);
    // For a regular file fill_buf() comes back with the whole first block, so fewer than two bytes
    // here means the file is shorter than the magic.
    let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    if is_gzip {
        log::debug!("{}: gzip compressed", path.as_ref().display());
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

#[cfg(test)]
pub fn write_gzipped(path: &Path, contents: &str) {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(contents.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

#[test]
fn test_open_plain() {
    let mut lines = vec![];
    for l in open_report("sar_test_data/timelog.txt").unwrap().lines() {
        lines.push(l.unwrap());
    }
    assert!(lines.len() == 4);
    assert!(lines[0].starts_with("setup start "));
}

#[test]
fn test_open_gzip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report");
    write_gzipped(&path, "first line\n\nthird line\n");
    let lines = open_report(&path)
        .unwrap()
        .lines()
        .collect::<std::io::Result<Vec<String>>>()
        .unwrap();
    assert!(lines == vec!["first line", "", "third line"]);
}

#[test]
fn test_open_short_and_empty() {
    let dir = tempfile::tempdir().unwrap();

    let empty = dir.path().join("empty");
    std::fs::write(&empty, "").unwrap();
    assert!(open_report(&empty).unwrap().lines().next().is_none());

    // One byte that happens to match the first magic byte is not gzip.
    let short = dir.path().join("short");
    std::fs::write(&short, [0x1fu8]).unwrap();
    let mut buf = vec![];
    open_report(&short).unwrap().read_until(b'\n', &mut buf).unwrap();
    assert!(buf == vec![0x1f]);
}

#[test]
fn test_open_errors() {
    // No such file
    assert!(open_report("sar_test_data/no_such_file.txt").is_err());

    // Corrupt gzip stream: the error surfaces when reading, not when opening.
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.gz");
    std::fs::write(&bad, [0x1fu8, 0x8b, 0x00, 0x00, 0x01, 0x02]).unwrap();
    let mut r = open_report(&bad).unwrap();
    let mut s = String::new();
    assert!(r.read_line(&mut s).is_err());
}
