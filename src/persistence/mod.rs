//! Filesystem state owned by the orchestrator: the run lock, the last-run
//! marker and the run log.

pub mod lock;
pub mod log_sink;
pub mod marker;

pub use lock::{LockGuard, LockState};
pub use log_sink::{LogSink, TAIL_LINES};
pub use marker::RunGate;
