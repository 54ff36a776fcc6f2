//! batchrun - a once-a-day orchestrator for ordered batch sync jobs

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod vcs;

// Re-export commonly used types
pub use core::{Pipeline, PipelineError, PipelineRun, RunStatus, StepFailure, StepSpec};
pub use execution::{ExecutionEngine, ExecutionEvent, ProcessStepExecutor, RunOptions, StepRunner};
pub use vcs::{CommitOutcome, GitCli, Vcs};
