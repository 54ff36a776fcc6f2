//! Test: Run Gate - at most one successful run per day

use crate::helpers::*;
use batchrun::core::RunStatus;
use batchrun::execution::ExecutionEvent;

const YAML: &str = r#"
name: "daily-sync"
steps:
  - name: "export_headers.py"
run_gate:
  marker_file: "last_run.txt"
lock:
  file: "pipeline.lock"
"#;

/// Marker already set to today: nothing executes
#[tokio::test]
async fn test_ran_today_skips() {
    let fixture = Fixture::new(YAML);
    std::fs::write(fixture.path("last_run.txt"), "2026-10-18\n").unwrap();
    let engine = fixture.engine(ScriptedRunner::new(), RecordingVcs::new());

    let (run, result, events) = run_collecting(&engine, options()).await;

    assert!(result.is_ok());
    assert_eq!(run.status, RunStatus::Skipped);
    assert!(engine.runner().calls().is_empty());
    assert!(events
        .iter()
        .any(|e| matches!(e, ExecutionEvent::PipelineSkipped { .. })));
    assert!(!fixture.path("pipeline.lock").exists());
}

/// Yesterday's marker does not block today
#[tokio::test]
async fn test_ran_yesterday_runs() {
    let fixture = Fixture::new(YAML);
    std::fs::write(fixture.path("last_run.txt"), "2026-10-17").unwrap();
    let engine = fixture.engine(ScriptedRunner::new(), RecordingVcs::new());

    let (run, result, _) = run_collecting(&engine, options()).await;

    assert_succeeded(&run, &result);
    assert_eq!(engine.runner().count("export_headers.py"), 1);
    assert_eq!(fixture.read("last_run.txt").trim(), "2026-10-18");
}

/// Unreadable marker content fails open
#[tokio::test]
async fn test_garbage_marker_runs() {
    let fixture = Fixture::new(YAML);
    std::fs::write(fixture.path("last_run.txt"), "not a date").unwrap();
    let engine = fixture.engine(ScriptedRunner::new(), RecordingVcs::new());

    let (run, result, _) = run_collecting(&engine, options()).await;

    assert_succeeded(&run, &result);
    assert_eq!(engine.runner().calls().len(), 1);
}

/// With skipping disabled the marker does not block a rerun
#[tokio::test]
async fn test_gate_disabled_runs_again() {
    let yaml = r#"
name: "daily-sync"
steps:
  - name: "export_headers.py"
run_gate:
  marker_file: "last_run.txt"
  skip_if_ran_today: false
"#;
    let fixture = Fixture::new(yaml);
    std::fs::write(fixture.path("last_run.txt"), "2026-10-18").unwrap();
    let engine = fixture.engine(ScriptedRunner::new(), RecordingVcs::new());

    let (run, result, _) = run_collecting(&engine, options()).await;

    assert_succeeded(&run, &result);
    assert_eq!(engine.runner().calls().len(), 1);
}
