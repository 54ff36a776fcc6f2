//! Fatal error taxonomy for a pipeline run

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a pipeline run.
///
/// Per-attempt failures (timeouts, nonzero exits, spawn errors) are plain
/// values on [`crate::core::StepAttempt`]; they only become an error once a
/// step has exhausted its attempts.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline already running (lock active for {age_secs}s): {}", path.display())]
    LockHeld { path: PathBuf, age_secs: u64 },

    #[error("step '{step}' not found: {}", path.display())]
    StepNotFound { step: String, path: PathBuf },

    #[error(transparent)]
    RetryExhausted(#[from] StepFailure),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A step that ran out of attempts
#[derive(Debug, Clone, Error)]
#[error("step '{step}' failed after {attempts} attempt(s) (exit={exit_code}); see log {}", log_path.display())]
pub struct StepFailure {
    pub step: String,
    pub attempts: u32,
    pub exit_code: i32,
    pub reason: Option<String>,
    pub log_path: PathBuf,
    pub log_tail: String,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PipelineError {
    PipelineError::Io {
        path: path.into(),
        source,
    }
}
