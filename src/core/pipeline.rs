//! Pipeline domain model

use crate::core::{
    config::PipelineConfig,
    step::{StepDefaults, StepSpec},
};
use crate::execution::RetryPolicy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A fully resolved pipeline: the one configuration value the engine runs from
#[derive(Debug, Clone, Serialize)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Directory all relative paths were resolved against
    pub base_dir: PathBuf,

    /// Steps in execution order
    pub steps: Vec<StepSpec>,

    /// How each step process is launched
    pub launcher: Launcher,

    pub retry: RetryPolicy,

    pub log_path: PathBuf,
    pub rotation: Option<RotationSettings>,
    pub lock: Option<LockSettings>,
    pub run_gate: Option<RunGateSettings>,
    pub commit: Option<CommitSettings>,
}

/// Argv prefix and environment for step processes
#[derive(Debug, Clone, Default, Serialize)]
pub struct Launcher {
    pub interpreter: Vec<String>,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RotationSettings {
    pub max_bytes: u64,
    pub keep: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LockSettings {
    pub path: PathBuf,
    pub stale_after: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunGateSettings {
    pub marker_path: PathBuf,
    pub skip_if_ran_today: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitSettings {
    pub repo_root: PathBuf,
    pub files: Vec<PathBuf>,
    pub message: String,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig, base_dir: &Path) -> Self {
        let defaults = StepDefaults {
            timeout_secs: config
                .default_timeout_secs
                .unwrap_or(StepDefaults::default().timeout_secs),
            retryable_prefixes: config.retry.retryable_prefixes.clone(),
        };

        let steps = config
            .steps
            .iter()
            .enumerate()
            .map(|(ordinal, step_config)| {
                StepSpec::from_config(step_config, ordinal, base_dir, &defaults)
            })
            .collect();

        Pipeline {
            name: config.name.clone(),
            base_dir: base_dir.to_path_buf(),
            steps,
            launcher: Launcher {
                interpreter: config.interpreter.clone(),
                env: config.env.clone(),
            },
            retry: RetryPolicy {
                max_attempts: config.retry.max_attempts,
                base_delay: Duration::from_secs(config.retry.base_delay_secs),
                backoff_cap: Duration::from_secs(config.retry.backoff_cap_secs),
            },
            log_path: base_dir.join(&config.log.file),
            rotation: config.log.max_bytes.map(|max_bytes| RotationSettings {
                max_bytes,
                keep: config.log.keep,
            }),
            lock: config.lock.as_ref().map(|lock| LockSettings {
                path: base_dir.join(&lock.file),
                stale_after: Duration::from_secs(lock.stale_after_secs),
            }),
            run_gate: config.run_gate.as_ref().map(|gate| RunGateSettings {
                marker_path: base_dir.join(&gate.marker_file),
                skip_if_ran_today: gate.skip_if_ran_today,
            }),
            commit: config.commit.as_ref().map(|commit| CommitSettings {
                repo_root: base_dir.join(&commit.repo_root),
                files: commit.files.iter().map(|f| base_dir.join(f)).collect(),
                message: commit.message.clone(),
            }),
        }
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.name == name)
    }
}
