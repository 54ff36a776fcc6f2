//! Test: Success Chain - every step runs once, in order

use crate::helpers::*;
use batchrun::core::RunStatus;
use batchrun::execution::ExecutionEvent;
use batchrun::vcs::CommitOutcome;

const YAML: &str = r#"
name: "daily-sync"
steps:
  - name: "export_headers.py"
  - name: "export_lines.py"
run_gate:
  marker_file: "last_run.txt"
lock:
  file: "pipeline.lock"
commit:
  repo_root: "."
  files: ["HEADERS.xlsx", "LINES.xlsx"]
  message: "chore: update exports"
"#;

/// Two succeeding steps with no prior marker
#[tokio::test]
async fn test_success_chain() {
    let fixture = Fixture::new(YAML);
    std::fs::write(fixture.path("HEADERS.xlsx"), "h").unwrap();
    let engine = fixture.engine(ScriptedRunner::new(), RecordingVcs::new());

    let (run, result, events) = run_collecting(&engine, options()).await;

    assert_succeeded(&run, &result);
    assert_eq!(
        engine.runner().calls(),
        vec![
            ("export_headers.py".to_string(), 1),
            ("export_lines.py".to_string(), 1)
        ]
    );
    assert_eq!(run.executed_steps(), vec!["export_headers.py", "export_lines.py"]);

    // Marker set to today, lock released
    assert_eq!(fixture.read("last_run.txt").trim(), "2026-10-18");
    assert!(!fixture.path("pipeline.lock").exists());

    // Only the artifact that exists is committed
    assert_eq!(engine.vcs().commits(), 1);
    assert!(matches!(
        &run.commit,
        Some(CommitOutcome::Committed { files }) if files.len() == 1
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, ExecutionEvent::CommitFinished { .. })));
    assert!(matches!(
        events.last(),
        Some(ExecutionEvent::PipelineCompleted { status: RunStatus::Succeeded, .. })
    ));
}

/// Log framing surrounds the run
#[tokio::test]
async fn test_log_is_framed() {
    let fixture = Fixture::new(YAML);
    let engine = fixture.engine(ScriptedRunner::new(), RecordingVcs::new());

    let (run, result, _) = run_collecting(&engine, options()).await;
    assert_succeeded(&run, &result);

    let log = fixture.read("pipeline.log");
    let start = log.find("PIPELINE START").unwrap();
    let end = log.find("PIPELINE END").unwrap();
    assert!(start < end);
    assert!(log.contains(&"#".repeat(90)));
}

/// A second run with unchanged artifacts makes no new commit
#[tokio::test]
async fn test_second_run_commits_nothing_new() {
    let fixture = Fixture::new(YAML);
    std::fs::write(fixture.path("LINES.xlsx"), "l").unwrap();
    let engine = fixture.engine(ScriptedRunner::new(), RecordingVcs::new());

    let (first, result, _) = run_collecting(&engine, options()).await;
    assert_succeeded(&first, &result);

    let forced = batchrun::execution::RunOptions {
        force: true,
        ..options()
    };
    let (second, result, _) = run_collecting(&engine, forced).await;
    assert_succeeded(&second, &result);

    assert_eq!(engine.vcs().commits(), 1);
    assert_eq!(second.commit, Some(CommitOutcome::Unchanged));
}
