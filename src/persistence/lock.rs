//! File-based run lock with staleness detection

use crate::core::{error::io_err, PipelineError};
use crate::persistence::log_sink::now_ts;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Holds the lock file for the lifetime of a run.
///
/// The file is removed by [`LockGuard::release`] or, failing that, on drop,
/// so every exit path (including panics and cancelled futures) frees it.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    /// Acquire the lock at `path`.
    ///
    /// Fails with [`PipelineError::LockHeld`] if a lock younger than
    /// `stale_after` exists. A stale lock is removed and replaced.
    pub fn acquire(path: &Path, stale_after: Duration) -> Result<Self, PipelineError> {
        if let Some(age) = lock_age(path).map_err(|e| io_err(path, e))? {
            if age < stale_after {
                return Err(PipelineError::LockHeld {
                    path: path.to_path_buf(),
                    age_secs: age.as_secs(),
                });
            }
            warn!(path = %path.display(), age_secs = age.as_secs(), "removing stale lock");
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_err(path, e)),
            }
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => file,
            // Another instance won the race between the check and the create
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(PipelineError::LockHeld {
                    path: path.to_path_buf(),
                    age_secs: 0,
                });
            }
            Err(e) => return Err(io_err(path, e)),
        };

        if let Err(e) = write_holder(&mut file).and_then(|_| file.sync_all()) {
            drop(file);
            return Err(abandon(path, e));
        }

        info!(path = %path.display(), "lock acquired");
        Ok(Self {
            path: path.to_path_buf(),
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock file now
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "lock released"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove lock"),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

fn write_holder(writer: &mut impl Write) -> io::Result<()> {
    let payload = format!("pid={} time={}\n", std::process::id(), now_ts());
    writer.write_all(payload.as_bytes())?;
    writer.flush()
}

/// Remove a lock file we created but could not finish writing
fn abandon(path: &Path, source: io::Error) -> PipelineError {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "failed to remove half-written lock");
    }
    io_err(path, source)
}

/// Age of the lock file from its modification time, `None` if absent.
/// A modification time in the future counts as age zero.
pub fn lock_age(path: &Path) -> io::Result<Option<Duration>> {
    let modified = match fs::metadata(path) {
        Ok(meta) => meta.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    Ok(Some(age))
}

/// Lock state as seen by an observer that doesn't want to take it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    Absent,
    Held { age: Duration, holder: String },
    Stale { age: Duration, holder: String },
}

/// Inspect the lock without modifying it
pub fn inspect(path: &Path, stale_after: Duration) -> io::Result<LockState> {
    let Some(age) = lock_age(path)? else {
        return Ok(LockState::Absent);
    };
    let holder = fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    if age < stale_after {
        Ok(LockState::Held { age, holder })
    } else {
        Ok(LockState::Stale { age, holder })
    }
}
