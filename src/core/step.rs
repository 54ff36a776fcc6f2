//! Step domain model

use crate::core::config::StepConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A single step in a pipeline. Immutable once built from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSpec {
    /// Step name (the executable's file name)
    pub name: String,

    /// Position in the pipeline, 0-based
    pub ordinal: usize,

    /// Resolved path of the executable
    pub path: PathBuf,

    /// Per-attempt timeout
    pub timeout: Duration,

    /// Whether failed attempts may be retried
    pub retryable: bool,
}

/// Values applied to steps that don't override them
#[derive(Debug, Clone)]
pub struct StepDefaults {
    pub timeout_secs: u64,
    pub retryable_prefixes: Vec<String>,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 15 * 60,
            retryable_prefixes: Vec::new(),
        }
    }
}

impl StepSpec {
    /// Create a step from a step config
    pub fn from_config(
        config: &StepConfig,
        ordinal: usize,
        base_dir: &Path,
        defaults: &StepDefaults,
    ) -> Self {
        StepSpec {
            name: config.name.clone(),
            ordinal,
            path: base_dir.join(&config.name),
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(defaults.timeout_secs)),
            retryable: is_retryable(&config.name, &defaults.retryable_prefixes),
        }
    }

    /// Check whether the executable is present on disk
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// The step runs from its own directory
    pub fn working_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Check a step name against the configured retryable prefixes
pub fn is_retryable(name: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
}
