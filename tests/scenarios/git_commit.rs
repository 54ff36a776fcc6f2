//! Test: Git Commit - artifacts committed once, only when changed

use crate::helpers::*;
use batchrun::core::config;
use batchrun::execution::{ExecutionEngine, RunOptions};
use batchrun::vcs::{CommitOutcome, GitCli};
use std::path::Path;
use std::process::Command;

const YAML: &str = r#"
name: "daily-sync"
steps:
  - name: "export_headers.py"
commit:
  repo_root: "."
  files: ["HEADERS.xlsx", "MISSING.xlsx"]
  message: "chore: update exports"
"#;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git").arg("-C").arg(dir).args(args).output().unwrap();
    assert!(output.status.success(), "git {:?} failed: {:?}", args, output);
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[tokio::test]
async fn test_real_git_commit_is_idempotent() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }

    let fixture = Fixture::new(YAML);
    let root = fixture.dir.path();
    git(root, &["init", "-q"]);
    git(root, &["config", "user.email", "batch@example.com"]);
    git(root, &["config", "user.name", "Batch Runner"]);
    git(root, &["config", "commit.gpgsign", "false"]);
    std::fs::write(fixture.path("HEADERS.xlsx"), "v1").unwrap();

    let forced = RunOptions {
        force: true,
        ..options()
    };
    let engine = ExecutionEngine::new(
        config::load(&fixture.config_path).unwrap(),
        ScriptedRunner::new(),
        GitCli::default(),
    );

    let (first, result, _) = run_collecting(&engine, forced).await;
    assert_succeeded(&first, &result);
    assert!(matches!(first.commit, Some(CommitOutcome::Committed { .. })));
    assert_eq!(git(root, &["rev-list", "--count", "HEAD"]), "1");
    assert_eq!(git(root, &["log", "-1", "--format=%s"]), "chore: update exports");

    let (second, result, _) = run_collecting(&engine, forced).await;
    assert_succeeded(&second, &result);
    assert_eq!(second.commit, Some(CommitOutcome::Unchanged));
    assert_eq!(git(root, &["rev-list", "--count", "HEAD"]), "1");

    std::fs::write(fixture.path("HEADERS.xlsx"), "v2").unwrap();
    let (third, result, _) = run_collecting(&engine, forced).await;
    assert_succeeded(&third, &result);
    assert_eq!(git(root, &["rev-list", "--count", "HEAD"]), "2");
}

/// Outside a repository the commit fails quietly and the run still succeeds
#[tokio::test]
async fn test_commit_failure_does_not_fail_run() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }

    let fixture = Fixture::new(YAML);
    std::fs::write(fixture.path("HEADERS.xlsx"), "v1").unwrap();
    let engine = ExecutionEngine::new(
        config::load(&fixture.config_path).unwrap(),
        ScriptedRunner::new(),
        GitCli::default(),
    );

    let (run, result, _) = run_collecting(&engine, options()).await;

    assert_succeeded(&run, &result);
    assert!(matches!(run.commit, Some(CommitOutcome::Failed { .. })));
}
