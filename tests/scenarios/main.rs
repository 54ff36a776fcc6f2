//! Scenario-based tests for batchrun


mod failure_handling;
mod git_commit;
mod lock_contention;
mod run_gate;
mod success_chain;
