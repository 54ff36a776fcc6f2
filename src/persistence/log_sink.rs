//! Append-only run log with size-based rotation and retention.
//!
//! The live log keeps its configured name (`pipeline.log`). Once it reaches
//! the size threshold it is renamed with a timestamp suffix
//! (`pipeline.20261018_063000.log`) and only the newest rotated files are
//! kept.

use chrono::{Local, SecondsFormat};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

/// Lines of log shown when a step fails
pub const TAIL_LINES: usize = 350;

/// Local timestamp used in every log record
pub fn now_ts() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Single-writer handle to the run log
#[derive(Debug, Clone)]
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `text` plus a newline and flush before returning
    pub fn append(&self, text: &str) -> io::Result<()> {
        let mut file = self.open_append()?;
        writeln!(file, "{text}")?;
        file.flush()
    }

    /// Open the log in append mode, e.g. to hand to a child process as stdout
    pub fn open_append(&self) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(&self.path)
    }

    /// Last `n` lines of the log; empty if it can't be read
    pub fn tail(&self, n: usize) -> String {
        match fs::read(&self.path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let lines: Vec<&str> = text.lines().collect();
                lines[lines.len().saturating_sub(n)..].join("\n")
            }
            Err(_) => String::new(),
        }
    }

    /// Current size in bytes, `None` if the file doesn't exist
    pub fn size(&self) -> Option<u64> {
        fs::metadata(&self.path).ok().map(|m| m.len())
    }
}

/// Rotate `log_path` if it is at or above `max_bytes`, then prune rotated
/// files down to the `keep` most recently modified.
///
/// Returns the rotated path, or `None` if no rotation was needed.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, keep: usize) -> io::Result<Option<PathBuf>> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    if size < max_bytes {
        return Ok(None);
    }

    let rotated = rotated_path(log_path, &Local::now().format("%Y%m%d_%H%M%S").to_string());
    fs::rename(log_path, &rotated)?;

    for old in rotated_files(log_path)?.into_iter().skip(keep) {
        if let Err(err) = fs::remove_file(&old) {
            warn!(path = %old.display(), error = %err, "failed to delete old log");
        }
    }

    Ok(Some(rotated))
}

/// Best-effort rotation: failures are logged and never abort the run
pub fn rotate_logs(log_path: &Path, max_bytes: u64, keep: usize) {
    match rotate_if_needed(log_path, max_bytes, keep) {
        Ok(Some(rotated)) => info!(path = %log_path.display(), rotated = %rotated.display(), "log file rotated"),
        Ok(None) => {}
        Err(err) => warn!(path = %log_path.display(), error = %err, "log rotation failed"),
    }
}

/// Rotated siblings of `log_path`, newest modification first
pub fn rotated_files(log_path: &Path) -> io::Result<Vec<PathBuf>> {
    let (stem, suffix) = split_name(log_path);
    let dir = match log_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !is_rotated_name(name, &stem, &suffix) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        found.push((modified, entry.path()));
    }

    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

/// `<stem>.<stamp><suffix>`, with `_N` appended to the stamp if taken
fn rotated_path(log_path: &Path, stamp: &str) -> PathBuf {
    let (stem, suffix) = split_name(log_path);
    let mut candidate = log_path.with_file_name(format!("{stem}.{stamp}{suffix}"));
    let mut n = 1;
    while candidate.exists() {
        candidate = log_path.with_file_name(format!("{stem}.{stamp}_{n}{suffix}"));
        n += 1;
    }
    candidate
}

/// Split `pipeline.log` into (`pipeline`, `.log`)
fn split_name(log_path: &Path) -> (String, String) {
    let stem = log_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("pipeline")
        .to_string();
    let suffix = log_path
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    (stem, suffix)
}

fn is_rotated_name(name: &str, stem: &str, suffix: &str) -> bool {
    let Some(rest) = name.strip_prefix(stem).and_then(|r| r.strip_prefix('.')) else {
        return false;
    };
    let Some(stamp) = rest.strip_suffix(suffix) else {
        return false;
    };
    !stamp.is_empty() && stamp.chars().all(|c| c.is_ascii_digit() || c == '_')
}
