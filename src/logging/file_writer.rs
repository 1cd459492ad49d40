//! Daily log files on disk
//!
//! Derives the per-day file name, normalizes and creates log directories, and
//! appends buffered lines to the current file.

use std::ffi::OsStr;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

/// Directory used when none has been configured
pub const DEFAULT_LOG_DIR: &str = "/logs";

/// Name of the log file for the given date: `log-YYYY-MM-DD.txt`
pub fn log_file_name(date: NaiveDate) -> String {
    format!("log-{}.txt", date.format("%Y-%m-%d"))
}

/// Path of the log file in `logs_dir` for the given date
pub fn log_file_path_for(logs_dir: &Path, date: NaiveDate) -> PathBuf {
    logs_dir.join(log_file_name(date))
}

/// Path of today's log file (local time) in `logs_dir`
pub fn today_log_file_path(logs_dir: &Path) -> PathBuf {
    log_file_path_for(logs_dir, Local::now().date_naive())
}

/// Strip trailing path separators and control characters from a directory
///
/// Works on the raw encoded bytes, so names that are not valid UTF-8 are kept
/// as given. A path consisting only of separators resolves to the root directory.
pub fn normalize_directory(path: &Path) -> PathBuf {
    let is_separator = |b: u8| std::path::is_separator(char::from(b));
    let raw = path.as_os_str().as_encoded_bytes();
    let trailing = raw
        .iter()
        .rev()
        .take_while(|&&b| is_separator(b) || b.is_ascii_control())
        .count();
    let kept = &raw[..raw.len() - trailing];

    if kept.is_empty() && raw.first().is_some_and(|&b| is_separator(b)) {
        return PathBuf::from(std::path::MAIN_SEPARATOR_STR);
    }

    path_from_bytes(kept)
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;

    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    // SAFETY: only trailing ASCII bytes were removed, so `bytes` ends on a
    // boundary of the original encoded string.
    PathBuf::from(unsafe { OsStr::from_encoded_bytes_unchecked(bytes) })
}

/// Create `logs_dir` and any missing parents
///
/// Succeeds if the directory already exists.
pub fn ensure_directory(logs_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(logs_dir)
}

/// Append `lines` to the file at `path`, one per line, creating it if needed
///
/// Nothing is opened when `lines` is empty.
pub fn append_lines(path: &Path, lines: &[String]) -> io::Result<()> {
    if lines.is_empty() {
        return Ok(());
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}
