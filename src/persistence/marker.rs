//! Once-per-day run gate backed by a last-successful-run marker file

use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reads and writes the last-run marker.
///
/// Both directions fail open: an unreadable or corrupt marker never blocks a
/// run, and a failed write never fails one.
#[derive(Debug, Clone)]
pub struct RunGate {
    marker_path: PathBuf,
}

impl RunGate {
    pub fn new(marker_path: impl Into<PathBuf>) -> Self {
        Self {
            marker_path: marker_path.into(),
        }
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// Date of the last successful run, if the marker is present and valid
    pub fn last_run(&self) -> Option<NaiveDate> {
        let raw = match fs::read_to_string(&self.marker_path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %self.marker_path.display(), error = %e, "no last-run marker");
                return None;
            }
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(e) => {
                warn!(path = %self.marker_path.display(), error = %e, "ignoring corrupt last-run marker");
                None
            }
        }
    }

    /// True only if the marker holds exactly `today`
    pub fn should_skip(&self, today: NaiveDate) -> bool {
        self.last_run() == Some(today)
    }

    /// Persist `today` as the last successful run. Returns whether the write succeeded.
    pub fn record_success(&self, today: NaiveDate) -> bool {
        match fs::write(&self.marker_path, today.format("%Y-%m-%d").to_string()) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.marker_path.display(), error = %e, "failed to write last-run marker");
                false
            }
        }
    }
}
