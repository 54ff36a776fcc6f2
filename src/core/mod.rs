//! Core domain models for the orchestrator
//!
//! This module defines the pipeline configuration, the resolved pipeline,
//! its steps, and the records produced while running them.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod state;
pub mod step;

pub use error::*;
pub use pipeline::*;
pub use state::*;
pub use step::*;
