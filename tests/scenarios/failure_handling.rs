//! Test: Failure Handling - fail fast on the first exhausted step

use crate::helpers::*;
use batchrun::core::{AttemptOutcome, PipelineError, RunStatus};
use batchrun::execution::ExecutionEvent;

const YAML: &str = r#"
name: "daily-sync"
steps:
  - name: "export_headers.py"
  - name: "export_lines.py"
  - name: "export_totals.py"
retry:
  retryable_prefixes: ["load_"]
run_gate:
  marker_file: "last_run.txt"
lock:
  file: "pipeline.lock"
commit:
  repo_root: "."
  files: ["HEADERS.xlsx"]
  message: "chore: update exports"
"#;

/// A non-retryable step fails once and later steps never run
#[tokio::test]
async fn test_non_retryable_failure_is_fatal() {
    let fixture = Fixture::new(YAML);
    std::fs::write(fixture.path("HEADERS.xlsx"), "h").unwrap();
    let runner = ScriptedRunner::new().script(
        "export_lines.py",
        vec![AttemptOutcome::NonZeroExit { code: 3 }],
    );
    let engine = fixture.engine(runner, RecordingVcs::new());

    let (run, result, events) = run_collecting(&engine, options()).await;

    assert!(matches!(
        result,
        Err(PipelineError::RetryExhausted(ref f)) if f.step == "export_lines.py" && f.attempts == 1
    ));
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(engine.runner().count("export_lines.py"), 1);
    assert_eq!(engine.runner().count("export_totals.py"), 0);
    assert!(retry_delays(&events).is_empty());
    assert!(events.iter().any(|e| matches!(
        e,
        ExecutionEvent::StepFailed { exit_code: 3, .. }
    )));

    // Failed run: no marker, no commit, lock released
    assert!(!fixture.path("last_run.txt").exists());
    assert_eq!(engine.vcs().commits(), 0);
    assert!(!fixture.path("pipeline.lock").exists());
}

/// The failure carries the tail of the run log
#[tokio::test]
async fn test_failure_reports_log_tail() {
    let fixture = Fixture::new(YAML);
    let runner = ScriptedRunner::new().script("export_headers.py", vec![AttemptOutcome::Timeout]);
    let engine = fixture.engine(runner, RecordingVcs::new());

    let (_, result, _) = run_collecting(&engine, options()).await;

    match result {
        Err(PipelineError::RetryExhausted(failure)) => {
            assert_eq!(failure.exit_code, 124);
            assert_eq!(failure.reason.as_deref(), Some("timeout"));
            assert!(failure.log_tail.contains("PIPELINE START"));
            assert_eq!(failure.log_path, fixture.dir.path().canonicalize().unwrap().join("pipeline.log"));
        }
        other => panic!("Expected RetryExhausted, got {:?}", other),
    }
}

/// A missing executable aborts before anything else runs
#[tokio::test]
async fn test_missing_step_aborts() {
    let fixture = Fixture::new(YAML);
    std::fs::remove_file(fixture.path("export_headers.py")).unwrap();
    let engine = fixture.engine(ScriptedRunner::new(), RecordingVcs::new());

    let (run, result, _) = run_collecting(&engine, options()).await;

    assert!(matches!(
        result,
        Err(PipelineError::StepNotFound { ref step, .. }) if step == "export_headers.py"
    ));
    assert_eq!(run.status, RunStatus::Failed);
    assert!(engine.runner().calls().is_empty());
    assert!(!fixture.path("pipeline.lock").exists());
}
