//! Retry controller - bounded retries with exponential backoff

use crate::{
    core::{StepAttempt, StepSpec},
    execution::{engine::ExecutionEvent, StepRunner},
};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Attempt ceiling and backoff schedule for retryable steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    /// Attempts for a retryable step (non-retryable steps always get one)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
            backoff_cap: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Attempts planned for `step`
    pub fn attempts_for(&self, step: &StepSpec) -> u32 {
        if step.retryable {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    /// Wait after failed attempt `attempt` (1-based): `min(base * 2^(attempt-1), cap)`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.backoff_cap)
    }
}

/// All attempts made for one step
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: String,
    pub attempts: Vec<StepAttempt>,
}

impl StepReport {
    /// True if the final attempt succeeded
    pub fn succeeded(&self) -> bool {
        self.attempts.last().is_some_and(|a| a.is_success())
    }

    pub fn last_attempt(&self) -> Option<&StepAttempt> {
        self.attempts.last()
    }
}

/// Wraps a [`StepRunner`] with the retry policy
pub struct RetryController<R> {
    runner: R,
    policy: RetryPolicy,
}

impl<R: StepRunner> RetryController<R> {
    pub fn new(runner: R, policy: RetryPolicy) -> Self {
        Self { runner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run `step` until it succeeds or its attempts are exhausted.
    ///
    /// Attempts run strictly one after another; the controller sleeps
    /// between them according to the policy.
    pub async fn run_with_retries(
        &self,
        step: &StepSpec,
        emit: &(dyn Fn(ExecutionEvent) + Send + Sync),
    ) -> StepReport {
        let total = self.policy.attempts_for(step);
        let mut attempts = Vec::new();

        for attempt in 1..=total {
            emit(ExecutionEvent::StepStarted {
                step: step.name.clone(),
                ordinal: step.ordinal,
                attempt,
                total_attempts: total,
            });

            let result = self.runner.run(step, attempt, total).await;
            emit(ExecutionEvent::AttemptFinished {
                step: step.name.clone(),
                attempt,
                total_attempts: total,
                exit_code: result.exit_code(),
                duration: result.duration,
            });

            let success = result.is_success();
            attempts.push(result);
            if success {
                break;
            }

            if attempt < total {
                let delay = self.policy.delay_after(attempt);
                warn!(
                    "Step {} failed (attempt {}/{}), retrying in {}s",
                    step.name,
                    attempt,
                    total,
                    delay.as_secs()
                );
                emit(ExecutionEvent::StepRetrying {
                    step: step.name.clone(),
                    next_attempt: attempt + 1,
                    total_attempts: total,
                    delay,
                });
                tokio::time::sleep(delay).await;
            }
        }

        let report = StepReport {
            step: step.name.clone(),
            attempts,
        };
        if !report.succeeded() {
            info!("Step {} exhausted {} attempt(s)", step.name, report.attempts.len());
        }
        report
    }
}
