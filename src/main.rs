use anyhow::{Context, Result};
use batchrun::cli::commands::{RunCommand, StatusCommand, ValidateCommand};
use batchrun::cli::output::*;
use batchrun::cli::{Cli, Command};
use batchrun::core::config::{self, PipelineConfig};
use batchrun::core::{PipelineError, PipelineRun};
use batchrun::execution::{ExecutionEngine, RunOptions};
use batchrun::persistence::{lock, log_sink, LogSink, RunGate};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {e}"))?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Status(cmd) => show_status(cmd)?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let pipeline = config::load(&cmd.file).context("Failed to load pipeline config")?;

    println!("{} Loaded pipeline: {}", INFO, style(&pipeline.name).bold());

    let mut run = PipelineRun::new(&pipeline.name);
    let engine = ExecutionEngine::for_pipeline(pipeline);
    if !cmd.json {
        engine.add_event_handler(|event| {
            println!("{}", format_execution_event(&event));
        });
    }

    let options = RunOptions {
        force: cmd.force,
        ..RunOptions::today()
    };
    let result = engine.execute(&mut run, options).await;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        println!("\n{}", format_run_summary(&run));
    }

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            if let PipelineError::RetryExhausted(failure) = &e {
                eprintln!("{}", format_failure(failure));
            }
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let config = match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{e:#}")).red());
            std::process::exit(1);
        }
    };

    let base_dir = config.resolve_base_dir(&cmd.file);
    let pipeline = config.to_pipeline(&base_dir);

    println!("{} Pipeline configuration is valid!", CHECK);
    println!("  Name: {}", style(&pipeline.name).bold());
    println!("  Base dir: {}", style(pipeline.base_dir.display()).dim());
    println!("  Steps: {}", style(pipeline.steps.len()).cyan());
    for step in &pipeline.steps {
        let marker = if step.exists() { CHECK } else { WARN };
        let attempts = pipeline.retry.attempts_for(step);
        println!(
            "    {}{} timeout={} attempts={}",
            marker,
            style(&step.name).bold(),
            format_duration(step.timeout),
            style(attempts).cyan()
        );
    }

    if cmd.json {
        let json = serde_json::to_string_pretty(&config)?;
        println!("\n{}", json);
    }
    Ok(())
}

fn show_status(cmd: &StatusCommand) -> Result<()> {
    let pipeline = config::load(&cmd.file).context("Failed to load pipeline config")?;

    println!("{} Pipeline: {}", INFO, style(&pipeline.name).bold());

    match &pipeline.lock {
        Some(settings) => {
            let state = lock::inspect(&settings.path, settings.stale_after)
                .with_context(|| format!("Failed to inspect {}", settings.path.display()))?;
            println!("  Lock: {}", format_lock_state(&state));
        }
        None => println!("  Lock: {}", style("not configured").dim()),
    }

    match &pipeline.run_gate {
        Some(settings) => match RunGate::new(&settings.marker_path).last_run() {
            Some(day) => println!("  Last success: {}", style(day).cyan()),
            None => println!("  Last success: {}", style("never").dim()),
        },
        None => println!("  Last success: {}", style("not tracked").dim()),
    }

    let log = LogSink::new(&pipeline.log_path);
    let size = log
        .size()
        .map(|bytes| format!("{bytes} bytes"))
        .unwrap_or_else(|| "absent".to_string());
    let rotated = log_sink::rotated_files(log.path()).map(|files| files.len()).unwrap_or(0);
    println!(
        "  Log: {} ({}, {} rotated)",
        style(log.path().display()).dim(),
        size,
        rotated
    );

    Ok(())
}
