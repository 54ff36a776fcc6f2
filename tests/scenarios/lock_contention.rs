//! Test: Lock Contention - a second invocation never runs steps

use crate::helpers::*;
use async_trait::async_trait;
use batchrun::core::{PipelineError, PipelineRun, RunStatus, StepAttempt, StepSpec};
use batchrun::execution::StepRunner;
use batchrun::persistence::log_sink;
use filetime::FileTime;
use std::time::{Duration, SystemTime};

const YAML: &str = r#"
name: "daily-sync"
steps:
  - name: "export_headers.py"
lock:
  file: "pipeline.lock"
  stale_after_secs: 21600
"#;

fn backdate(path: &std::path::Path, age: Duration) {
    let when = FileTime::from_system_time(SystemTime::now() - age);
    filetime::set_file_mtime(path, when).unwrap();
}

/// A fresh lock held by someone else fails the run immediately
#[tokio::test]
async fn test_fresh_lock_is_held() {
    let fixture = Fixture::new(YAML);
    let lock = fixture.path("pipeline.lock");
    std::fs::write(&lock, "pid=4242 time=2026-10-18T06:00:00+02:00").unwrap();
    backdate(&lock, Duration::from_secs(10));
    let engine = fixture.engine(ScriptedRunner::new(), RecordingVcs::new());

    let (run, result, _) = run_collecting(&engine, options()).await;

    match result {
        Err(PipelineError::LockHeld { age_secs, .. }) => assert!(age_secs >= 10),
        other => panic!("Expected LockHeld, got {:?}", other),
    }
    assert_eq!(run.status, RunStatus::Failed);
    assert!(engine.runner().calls().is_empty());

    // Someone else's lock stays where it was
    assert!(lock.exists());
    assert!(!fixture.read("pipeline.log").contains("PIPELINE START"));
}

/// A lock older than the stale threshold is taken over
#[tokio::test]
async fn test_stale_lock_is_reclaimed() {
    let fixture = Fixture::new(YAML);
    let lock = fixture.path("pipeline.lock");
    std::fs::write(&lock, "pid=1 time=2026-10-17T00:00:00+02:00").unwrap();
    backdate(&lock, Duration::from_secs(7 * 60 * 60));
    let engine = fixture.engine(ScriptedRunner::new(), RecordingVcs::new());

    let (run, result, _) = run_collecting(&engine, options()).await;

    assert_succeeded(&run, &result);
    assert_eq!(engine.runner().calls().len(), 1);
    assert!(!lock.exists());
}

/// A blocked invocation leaves the live run's log alone
#[tokio::test]
async fn test_held_lock_does_not_rotate_log() {
    let yaml = r#"
name: "daily-sync"
steps:
  - name: "export_headers.py"
lock:
  file: "pipeline.lock"
log:
  max_bytes: 10
  keep: 2
"#;
    let fixture = Fixture::new(yaml);
    let lock = fixture.path("pipeline.lock");
    std::fs::write(&lock, "pid=4242 time=2026-10-18T06:00:00+02:00").unwrap();
    let live = "[live run] RUN (attempt 1/1) | timeout=900s\n".repeat(4);
    std::fs::write(fixture.path("pipeline.log"), &live).unwrap();
    let engine = fixture.engine(ScriptedRunner::new(), RecordingVcs::new());

    let (_, result, _) = run_collecting(&engine, options()).await;

    assert!(matches!(result, Err(PipelineError::LockHeld { .. })));
    assert_eq!(fixture.read("pipeline.log"), live);
    assert!(log_sink::rotated_files(&fixture.path("pipeline.log"))
        .unwrap()
        .is_empty());
}

struct PanickingRunner;

#[async_trait]
impl StepRunner for PanickingRunner {
    async fn run(&self, step: &StepSpec, _attempt: u32, _total_attempts: u32) -> StepAttempt {
        panic!("step {} blew up", step.name);
    }
}

/// A panic unwinding through the run still frees the lock
#[tokio::test]
async fn test_lock_released_when_run_panics() {
    let fixture = Fixture::new(YAML);
    let lock = fixture.path("pipeline.lock");
    let engine = fixture.engine(PanickingRunner, RecordingVcs::new());

    let task = tokio::spawn(async move {
        let mut run = PipelineRun::new("daily-sync");
        engine.execute(&mut run, options()).await
    });
    let joined = task.await;

    assert!(joined.unwrap_err().is_panic());
    assert!(!lock.exists());
}
