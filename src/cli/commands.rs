//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Run the pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Run even if the pipeline already succeeded today
    #[arg(long)]
    pub force: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show lock, last-run and log state
#[derive(Debug, Args, Clone)]
pub struct StatusCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,
}
