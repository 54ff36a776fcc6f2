//! CLI output formatting

use crate::{
    core::{PipelineRun, RunStatus, StepFailure},
    execution::ExecutionEvent,
    persistence::LockState,
    vcs::CommitOutcome,
};
use console::Emoji;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::Skipped => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            run_id,
            pipeline_name,
            total_steps,
        } => format!(
            "{} Starting pipeline {} ({}, {} steps)",
            ROCKET,
            style(pipeline_name).bold(),
            style(&run_id.to_string()[..8]).dim(),
            total_steps
        ),
        ExecutionEvent::PipelineSkipped { last_run } => format!(
            "{} Already ran today ({}), nothing to do",
            INFO,
            style(last_run).dim()
        ),
        ExecutionEvent::StepStarted {
            step,
            ordinal,
            attempt,
            total_attempts,
        } => {
            if *total_attempts > 1 {
                format!(
                    "{} [{}] {} (attempt {}/{})",
                    SPINNER,
                    ordinal + 1,
                    style(step).cyan(),
                    attempt,
                    total_attempts
                )
            } else {
                format!("{} [{}] {}", SPINNER, ordinal + 1, style(step).cyan())
            }
        }
        ExecutionEvent::AttemptFinished {
            step,
            exit_code,
            duration,
            ..
        } => format!(
            "   {} exit={} in {}",
            style(step).dim(),
            exit_code,
            format_duration(*duration)
        ),
        ExecutionEvent::StepRetrying {
            step,
            next_attempt,
            total_attempts,
            delay,
        } => format!(
            "{} {} retrying in {} (attempt {}/{})",
            WARN,
            style(step).yellow(),
            format_duration(*delay),
            next_attempt,
            total_attempts
        ),
        ExecutionEvent::StepCompleted { step, attempts } => {
            if *attempts > 1 {
                format!("{} {} after {} attempts", CHECK, style(step).green(), attempts)
            } else {
                format!("{} {}", CHECK, style(step).green())
            }
        }
        ExecutionEvent::StepFailed {
            step,
            exit_code,
            reason,
        } => format!(
            "{} {} (exit={}): {}",
            CROSS,
            style(step).red(),
            exit_code,
            style(reason.as_deref().unwrap_or("unknown")).dim()
        ),
        ExecutionEvent::CommitFinished { outcome } => format_commit_outcome(outcome),
        ExecutionEvent::PipelineCompleted { run_id, status } => format!(
            "{} Pipeline ({}) {}",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            format_status(*status)
        ),
    }
}

/// Format the artifact commit result
pub fn format_commit_outcome(outcome: &CommitOutcome) -> String {
    match outcome {
        CommitOutcome::NoArtifacts => format!("{} No artifacts to commit", INFO),
        CommitOutcome::Unchanged => format!("{} Artifacts unchanged, nothing committed", INFO),
        CommitOutcome::Committed { files } => format!(
            "{} Committed {} artifact(s)",
            CHECK,
            style(files.len()).cyan()
        ),
        CommitOutcome::Failed { stage, error } => format!(
            "{} Artifact commit skipped ({:?}): {}",
            WARN,
            stage,
            style(error).dim()
        ),
    }
}

/// Consolidated failure report with the tail of the log
pub fn format_failure(failure: &StepFailure) -> String {
    let rule = "!".repeat(90);
    let mut out = format!(
        "\n{}\n{} Failed: {} (exit={})\n",
        style(&rule).red(),
        CROSS,
        style(&failure.step).bold(),
        failure.exit_code
    );
    if let Some(reason) = &failure.reason {
        out.push_str(&format!("{} Reason: {}\n", INFO, reason));
    }
    out.push_str(&format!("{} Last lines of the log:\n\n", INFO));
    out.push_str(&failure.log_tail);
    out.push_str(&format!("\n{}\n", style(&rule).red()));
    out
}

/// Format the lock state for `status`
pub fn format_lock_state(state: &LockState) -> String {
    match state {
        LockState::Absent => style("free").green().to_string(),
        LockState::Held { age, holder } => format!(
            "{} for {} ({})",
            style("held").yellow(),
            format_duration(*age),
            style(holder).dim()
        ),
        LockState::Stale { age, holder } => format!(
            "{} for {} ({})",
            style("stale").red(),
            format_duration(*age),
            style(holder).dim()
        ),
    }
}

/// One-line summary of a finished run
pub fn format_run_summary(run: &PipelineRun) -> String {
    let steps = run.executed_steps().len();
    let duration = run
        .duration()
        .map(format_duration)
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} {} - {} - {} step(s), {} attempt(s) in {}",
        style(&run.run_id.to_string()[..8]).dim(),
        style(&run.pipeline_name).bold(),
        format_status(run.status),
        steps,
        run.attempts.len(),
        duration
    )
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
