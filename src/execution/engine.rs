//! Main execution engine - drives one pipeline run end to end

use crate::{
    core::{Pipeline, PipelineError, PipelineRun, RunStatus, StepFailure},
    execution::{ProcessStepExecutor, RetryController, StepReport, StepRunner},
    persistence::{log_sink, LockGuard, LogSink, RunGate, TAIL_LINES},
    vcs::{ArtifactCommitter, CommitOutcome, GitCli, Vcs},
};
use chrono::NaiveDate;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        run_id: Uuid,
        pipeline_name: String,
        total_steps: usize,
    },
    PipelineSkipped {
        last_run: NaiveDate,
    },
    StepStarted {
        step: String,
        ordinal: usize,
        attempt: u32,
        total_attempts: u32,
    },
    AttemptFinished {
        step: String,
        attempt: u32,
        total_attempts: u32,
        exit_code: i32,
        duration: Duration,
    },
    StepRetrying {
        step: String,
        next_attempt: u32,
        total_attempts: u32,
        delay: Duration,
    },
    StepCompleted {
        step: String,
        attempts: u32,
    },
    StepFailed {
        step: String,
        exit_code: i32,
        reason: Option<String>,
    },
    CommitFinished {
        outcome: CommitOutcome,
    },
    PipelineCompleted {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Per-invocation options
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Calendar day the run counts for
    pub today: NaiveDate,

    /// Run even if the gate says today already succeeded
    pub force: bool,
}

impl RunOptions {
    pub fn today() -> Self {
        Self {
            today: chrono::Local::now().date_naive(),
            force: false,
        }
    }
}

/// Main pipeline execution engine
///
/// Runs the steps of a [`Pipeline`] in order, one at a time, stopping at
/// the first step that exhausts its attempts. The run lock is held for the
/// whole run and released on every exit path.
pub struct ExecutionEngine<R, V> {
    pipeline: Pipeline,
    retry: RetryController<R>,
    committer: ArtifactCommitter<V>,
    log: LogSink,
    event_handlers: Mutex<Vec<EventHandler>>,
}

impl ExecutionEngine<ProcessStepExecutor, GitCli> {
    /// Engine that runs real processes and commits with the `git` CLI
    pub fn for_pipeline(pipeline: Pipeline) -> Self {
        let log = LogSink::new(&pipeline.log_path);
        let executor = ProcessStepExecutor::new(pipeline.launcher.clone(), log);
        Self::new(pipeline, executor, GitCli::default())
    }
}

impl<R: StepRunner, V: Vcs> ExecutionEngine<R, V> {
    pub fn new(pipeline: Pipeline, runner: R, vcs: V) -> Self {
        let log = LogSink::new(&pipeline.log_path);
        let retry = RetryController::new(runner, pipeline.retry);
        Self {
            pipeline,
            retry,
            committer: ArtifactCommitter::new(vcs),
            log,
            event_handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn runner(&self) -> &R {
        self.retry.runner()
    }

    pub fn vcs(&self) -> &V {
        self.committer.vcs()
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        if let Ok(mut handlers) = self.event_handlers.lock() {
            handlers.push(Arc::new(handler));
        }
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        let handlers = match self.event_handlers.lock() {
            Ok(handlers) => handlers.clone(),
            Err(_) => return,
        };
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute the pipeline once.
    ///
    /// `run` is filled in as the pipeline progresses, so callers can inspect
    /// the attempts made even when an error is returned.
    pub async fn execute(&self, run: &mut PipelineRun, options: RunOptions) -> Result<(), PipelineError> {
        let lock = match &self.pipeline.lock {
            Some(settings) => match LockGuard::acquire(&settings.path, settings.stale_after) {
                Ok(guard) => Some(guard),
                Err(e) => {
                    error!("{}", e);
                    run.fail();
                    self.emit_event(ExecutionEvent::PipelineCompleted {
                        run_id: run.run_id,
                        status: run.status,
                    });
                    return Err(e);
                }
            },
            None => None,
        };

        // Only the lock holder may touch the live log
        if let Some(rotation) = &self.pipeline.rotation {
            log_sink::rotate_logs(self.log.path(), rotation.max_bytes, rotation.keep);
        }

        let result = self.execute_locked(run, options).await;

        if let Some(lock) = lock {
            lock.release();
        }

        if result.is_err() && run.status == RunStatus::Running {
            run.fail();
        }
        info!("Pipeline execution finished: {} - {:?}", self.pipeline.name, run.status);
        self.emit_event(ExecutionEvent::PipelineCompleted {
            run_id: run.run_id,
            status: run.status,
        });

        result
    }

    async fn execute_locked(&self, run: &mut PipelineRun, options: RunOptions) -> Result<(), PipelineError> {
        if let Some(gate_settings) = &self.pipeline.run_gate {
            let gate = RunGate::new(&gate_settings.marker_path);
            if gate_settings.skip_if_ran_today && !options.force && gate.should_skip(options.today) {
                info!("Pipeline {} already ran on {}, skipping", self.pipeline.name, options.today);
                run.skip();
                self.emit_event(ExecutionEvent::PipelineSkipped {
                    last_run: options.today,
                });
                return Ok(());
            }
        }

        info!("Starting pipeline execution: {} ({})", self.pipeline.name, run.run_id);
        self.log_line(&format!("\n{}\nPIPELINE START {}", "#".repeat(90), log_sink::now_ts()));
        self.emit_event(ExecutionEvent::PipelineStarted {
            run_id: run.run_id,
            pipeline_name: self.pipeline.name.clone(),
            total_steps: self.pipeline.steps.len(),
        });

        let emit = |event: ExecutionEvent| self.emit_event(event);
        for step in &self.pipeline.steps {
            if !step.exists() {
                error!("Step {} not found at {}", step.name, step.path.display());
                return Err(PipelineError::StepNotFound {
                    step: step.name.clone(),
                    path: step.path.clone(),
                });
            }

            let report = self.retry.run_with_retries(step, &emit).await;
            for attempt in &report.attempts {
                run.record(attempt.clone());
            }

            if !report.succeeded() {
                let failure = self.step_failure(&report);
                self.emit_event(ExecutionEvent::StepFailed {
                    step: failure.step.clone(),
                    exit_code: failure.exit_code,
                    reason: failure.reason.clone(),
                });
                return Err(failure.into());
            }

            self.emit_event(ExecutionEvent::StepCompleted {
                step: step.name.clone(),
                attempts: report.attempts.len() as u32,
            });
        }

        self.log_line(&format!("PIPELINE END   {}", log_sink::now_ts()));

        if let Some(gate_settings) = &self.pipeline.run_gate {
            RunGate::new(&gate_settings.marker_path).record_success(options.today);
        }

        if let Some(commit) = &self.pipeline.commit {
            let outcome = self
                .committer
                .commit_if_changed(&commit.repo_root, &commit.files, &commit.message)
                .await;
            self.emit_event(ExecutionEvent::CommitFinished {
                outcome: outcome.clone(),
            });
            run.commit = Some(outcome);
        }

        run.succeed();
        Ok(())
    }

    fn step_failure(&self, report: &StepReport) -> StepFailure {
        let last = report.last_attempt();
        StepFailure {
            step: report.step.clone(),
            attempts: report.attempts.len() as u32,
            exit_code: last.map(|a| a.exit_code()).unwrap_or_default(),
            reason: last.and_then(|a| a.failure_reason()),
            log_path: self.log.path().to_path_buf(),
            log_tail: self.log.tail(TAIL_LINES),
        }
    }

    fn log_line(&self, text: &str) {
        if let Err(e) = self.log.append(text) {
            warn!(path = %self.log.path().display(), error = %e, "failed to write run log");
        }
    }
}
