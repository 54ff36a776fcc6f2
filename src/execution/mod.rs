//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod retry;

pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent, RunOptions};
pub use executor::{ProcessStepExecutor, StepRunner};
pub use retry::{RetryController, RetryPolicy, StepReport};
