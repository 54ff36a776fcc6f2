//! Pipeline configuration from YAML

use crate::core::Pipeline;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Directory holding the step executables and the log/lock/marker files.
    /// Relative values are resolved against the config file's directory.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// Ordered pipeline steps
    pub steps: Vec<StepConfig>,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Optional argv prefix used to launch each step (e.g. an interpreter)
    #[serde(default)]
    pub interpreter: Vec<String>,

    /// Extra environment for every step
    #[serde(default = "default_env")]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// File lock preventing concurrent runs
    #[serde(default)]
    pub lock: Option<LockConfig>,

    /// Once-per-day run gate
    #[serde(default)]
    pub run_gate: Option<RunGateConfig>,

    /// Output files committed after a successful run
    #[serde(default)]
    pub commit: Option<CommitConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Executable file name, relative to the base directory
    pub name: String,

    /// Timeout for this step (overrides the default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Steps whose name starts with one of these are retryable
    #[serde(default)]
    pub retryable_prefixes: Vec<String>,

    /// Attempt ceiling for retryable steps
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,

    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Rotate before the run once the log reaches this size (never if unset)
    #[serde(default)]
    pub max_bytes: Option<u64>,

    /// Rotated files to retain
    #[serde(default = "default_keep")]
    pub keep: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    pub file: PathBuf,

    /// A lock older than this is considered abandoned
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunGateConfig {
    pub marker_file: PathBuf,

    #[serde(default = "default_true")]
    pub skip_if_ran_today: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitConfig {
    pub repo_root: PathBuf,
    pub files: Vec<PathBuf>,
    pub message: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retryable_prefixes: Vec::new(),
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            backoff_cap_secs: default_backoff_cap_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            max_bytes: None,
            keep: default_keep(),
        }
    }
}

fn default_env() -> BTreeMap<String, String> {
    BTreeMap::from([("PYTHONUTF8".to_string(), "1".to_string())])
}

/// Upper bound accepted for `retry.max_attempts`
pub const MAX_ATTEMPTS_LIMIT: u32 = 100;

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_secs() -> u64 {
    60
}

fn default_backoff_cap_secs() -> u64 {
    300
}

fn default_log_file() -> PathBuf {
    PathBuf::from("pipeline.log")
}

fn default_keep() -> usize {
    5
}

fn default_stale_after_secs() -> u64 {
    6 * 60 * 60
}

fn default_true() -> bool {
    true
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                anyhow::bail!("Step with empty name");
            }
            if !seen.insert(&step.name) {
                anyhow::bail!("Duplicate step: {}", step.name);
            }
            if step.timeout_secs == Some(0) {
                anyhow::bail!("Step '{}' has a zero timeout", step.name);
            }
        }

        if self.default_timeout_secs == Some(0) {
            anyhow::bail!("default_timeout_secs must be greater than zero");
        }

        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if self.retry.max_attempts > MAX_ATTEMPTS_LIMIT {
            anyhow::bail!(
                "retry.max_attempts must be at most {} (got {})",
                MAX_ATTEMPTS_LIMIT,
                self.retry.max_attempts
            );
        }

        if self.log.max_bytes.is_some() && self.log.keep == 0 {
            anyhow::bail!("log.keep must be at least 1 when rotation is enabled");
        }

        if let Some(commit) = &self.commit {
            if commit.message.trim().is_empty() {
                anyhow::bail!("commit.message must not be empty");
            }
        }

        Ok(())
    }

    /// Directory steps and state files are resolved against
    pub fn resolve_base_dir(&self, config_path: &Path) -> PathBuf {
        let config_dir = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let base = match &self.base_dir {
            Some(dir) => config_dir.join(dir),
            None => config_dir.to_path_buf(),
        };
        std::fs::canonicalize(&base).unwrap_or(base)
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self, base_dir: &Path) -> Pipeline {
        Pipeline::from_config(self, base_dir)
    }
}

/// Read, validate and resolve a pipeline file in one go
pub fn load(path: &Path) -> Result<Pipeline> {
    let config = PipelineConfig::from_file(path)?;
    let base_dir = config.resolve_base_dir(path);
    Ok(config.to_pipeline(&base_dir))
}
