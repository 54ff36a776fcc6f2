//! Version control for produced artifacts

pub mod committer;
pub mod git;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use committer::{ArtifactCommitter, CommitOutcome, CommitStage};
pub use git::GitCli;

/// Error types for version control operations
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with code {code}: {stderr}")]
    Command {
        command: String,
        code: i32,
        stderr: String,
    },
}

/// The three operations the orchestrator needs from a repository.
///
/// `paths` are relative to `repo_root`.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Whether any of `paths` has uncommitted changes
    async fn has_changes(&self, repo_root: &Path, paths: &[PathBuf]) -> Result<bool, VcsError>;

    /// Stage exactly `paths`
    async fn add(&self, repo_root: &Path, paths: &[PathBuf]) -> Result<(), VcsError>;

    /// Commit what is staged
    async fn commit(&self, repo_root: &Path, message: &str) -> Result<(), VcsError>;
}
