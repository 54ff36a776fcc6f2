//! Execution state models

use crate::vcs::CommitOutcome;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Exit code recorded when a step is killed for exceeding its timeout
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code recorded when the step could not be spawned or waited on
pub const INTERNAL_ERROR_EXIT_CODE: i32 = 125;

/// How a single attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Exit code 0
    Success,
    /// The step reported its own failure code
    NonZeroExit { code: i32 },
    /// Killed after exceeding the step timeout
    Timeout,
    /// Spawn or wait failure
    InternalError { error: String },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }

    /// Exit code as written to the log, with sentinels for timeout and internal errors
    pub fn exit_code(&self) -> i32 {
        match self {
            AttemptOutcome::Success => 0,
            AttemptOutcome::NonZeroExit { code } => *code,
            AttemptOutcome::Timeout => TIMEOUT_EXIT_CODE,
            AttemptOutcome::InternalError { .. } => INTERNAL_ERROR_EXIT_CODE,
        }
    }

    /// Failure reason, `None` on success
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            AttemptOutcome::Success => None,
            AttemptOutcome::NonZeroExit { .. } => Some("nonzero exit".to_string()),
            AttemptOutcome::Timeout => Some("timeout".to_string()),
            AttemptOutcome::InternalError { error } => Some(error.clone()),
        }
    }
}

/// One execution attempt of a step. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepAttempt {
    /// Step name
    pub step: String,

    /// 1-based attempt index
    pub attempt: u32,

    /// Attempts planned for this step
    pub total_attempts: u32,

    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub duration: Duration,
    pub outcome: AttemptOutcome,
}

impl StepAttempt {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }

    pub fn failure_reason(&self) -> Option<String> {
        self.outcome.failure_reason()
    }
}

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is in progress
    Running,
    /// Every step succeeded
    Succeeded,
    /// A fatal error aborted the run
    Failed,
    /// The run gate found a successful run for today
    Skipped,
}

/// A single invocation of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub pipeline_name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Local>,

    /// Absent while running
    pub finished_at: Option<DateTime<Local>>,

    /// Every attempt across all steps, in execution order
    pub attempts: Vec<StepAttempt>,

    /// Result of the artifact commit, if one was attempted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitOutcome>,
}

impl PipelineRun {
    pub fn new(pipeline_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline_name: pipeline_name.into(),
            status: RunStatus::Running,
            started_at: Local::now(),
            finished_at: None,
            attempts: Vec::new(),
            commit: None,
        }
    }

    pub fn record(&mut self, attempt: StepAttempt) {
        self.attempts.push(attempt);
    }

    pub fn succeed(&mut self) {
        self.finish(RunStatus::Succeeded);
    }

    pub fn fail(&mut self) {
        self.finish(RunStatus::Failed);
    }

    pub fn skip(&mut self) {
        self.finish(RunStatus::Skipped);
    }

    fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Local::now());
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Number of attempts made for the named step
    pub fn attempts_for(&self, step: &str) -> usize {
        self.attempts.iter().filter(|a| a.step == step).count()
    }

    /// Step names in the order they first ran
    pub fn executed_steps(&self) -> Vec<&str> {
        let mut steps: Vec<&str> = Vec::new();
        for attempt in &self.attempts {
            if steps.last() != Some(&attempt.step.as_str()) {
                steps.push(&attempt.step);
            }
        }
        steps
    }

    /// Elapsed wall time, if finished
    pub fn duration(&self) -> Option<Duration> {
        self.finished_at
            .and_then(|end| end.signed_duration_since(self.started_at).to_std().ok())
    }
}
