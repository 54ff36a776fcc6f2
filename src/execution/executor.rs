//! Step executor - runs one attempt of a step as a child process

use crate::{
    core::{AttemptOutcome, Launcher, StepAttempt, StepSpec},
    persistence::{log_sink::now_ts, LogSink},
};
use async_trait::async_trait;
use chrono::Local;
use std::ffi::OsString;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Runs a single attempt of a step.
///
/// Implementations never fail: every way an attempt can end is described by
/// the returned [`StepAttempt`].
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn run(&self, step: &StepSpec, attempt: u32, total_attempts: u32) -> StepAttempt;
}

/// Spawns the step executable with its output appended to the run log
pub struct ProcessStepExecutor {
    launcher: Launcher,
    log: LogSink,
}

impl ProcessStepExecutor {
    pub fn new(launcher: Launcher, log: LogSink) -> Self {
        Self { launcher, log }
    }

    /// Program and arguments for a step
    fn command_line(&self, step: &StepSpec) -> (OsString, Vec<OsString>) {
        match self.launcher.interpreter.split_first() {
            Some((program, args)) => {
                let mut argv: Vec<OsString> = args.iter().map(OsString::from).collect();
                argv.push(step.path.clone().into_os_string());
                (OsString::from(program), argv)
            }
            None => (step.path.clone().into_os_string(), Vec::new()),
        }
    }

    fn display_command(&self, step: &StepSpec) -> String {
        let (program, args) = self.command_line(step);
        std::iter::once(program)
            .chain(args)
            .map(|s| s.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn log_line(&self, text: &str) {
        if let Err(e) = self.log.append(text) {
            warn!(path = %self.log.path().display(), error = %e, "failed to write run log");
        }
    }

    async fn spawn_and_wait(&self, step: &StepSpec) -> AttemptOutcome {
        let stdout = match self.log.open_append() {
            Ok(file) => file,
            Err(e) => {
                return AttemptOutcome::InternalError {
                    error: format!("failed to open log for step output: {e}"),
                }
            }
        };
        let stderr = match stdout.try_clone() {
            Ok(file) => file,
            Err(e) => {
                return AttemptOutcome::InternalError {
                    error: format!("failed to open log for step output: {e}"),
                }
            }
        };

        let (program, args) = self.command_line(step);
        let mut command = Command::new(&program);
        command
            .args(&args)
            .current_dir(step.working_dir())
            .envs(&self.launcher.env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        // Own process group, so a timeout also takes down grandchildren
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn step {}: {}", step.name, e);
                return AttemptOutcome::InternalError {
                    error: format!("failed to spawn {}: {e}", program.to_string_lossy()),
                };
            }
        };

        match timeout(step.timeout, child.wait()).await {
            Ok(Ok(status)) => match status.code() {
                Some(0) => AttemptOutcome::Success,
                Some(code) => AttemptOutcome::NonZeroExit { code },
                // Terminated by a signal
                None => AttemptOutcome::NonZeroExit { code: -1 },
            },
            Ok(Err(e)) => {
                error!("Error waiting on step {}: {}", step.name, e);
                let _ = child.kill().await;
                AttemptOutcome::InternalError {
                    error: e.to_string(),
                }
            }
            Err(_) => {
                error!("Timeout for step {} after {}s", step.name, step.timeout.as_secs());
                if let Some(pid) = child.id() {
                    kill_process_group(pid);
                }
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill step {}: {}", step.name, e);
                }
                AttemptOutcome::Timeout
            }
        }
    }
}

/// SIGKILL every process in the group led by `pid`
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    #[allow(clippy::cast_possible_wrap)]
    let group = Pid::from_raw(pid as i32);
    if let Err(e) = killpg(group, Signal::SIGKILL) {
        warn!("Failed to kill process group {}: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

#[async_trait]
impl StepRunner for ProcessStepExecutor {
    async fn run(&self, step: &StepSpec, attempt: u32, total_attempts: u32) -> StepAttempt {
        info!("Executing step: {} (attempt {}/{})", step.name, attempt, total_attempts);

        let started_at = Local::now();
        let start = Instant::now();
        let ts = now_ts();
        let command = self.display_command(step);
        debug!("Command for step {}: {}", step.name, command);

        self.log_line(&format!(
            "\n{}\n[{ts}] RUN (attempt {attempt}/{total_attempts}) | timeout={}s\n[{ts}] CMD: {command}",
            "=".repeat(90),
            step.timeout.as_secs(),
        ));

        let outcome = self.spawn_and_wait(step).await;

        match &outcome {
            AttemptOutcome::Timeout => {
                self.log_line(&format!("[{}] TIMEOUT -> KILL {}", now_ts(), step.name));
            }
            AttemptOutcome::InternalError { error } => {
                self.log_line(&format!("[{}] ERROR waiting process: {}", now_ts(), error));
            }
            _ => {}
        }

        let duration = start.elapsed();
        self.log_line(&format!(
            "[{}] EXIT={} | dur={:.1}s | {}",
            now_ts(),
            outcome.exit_code(),
            duration.as_secs_f64(),
            step.name
        ));

        StepAttempt {
            step: step.name.clone(),
            attempt,
            total_attempts,
            started_at,
            finished_at: Local::now(),
            duration,
            outcome,
        }
    }
}
