//! Commits produced artifacts after a successful run, only when they changed

use crate::vcs::Vcs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where a commit attempt stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStage {
    Resolve,
    Status,
    Add,
    Commit,
}

/// Result of [`ArtifactCommitter::commit_if_changed`]. Never an error:
/// committing is a side effect that cannot fail the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// None of the configured files exist
    NoArtifacts,
    /// The files match what is committed
    Unchanged,
    Committed { files: Vec<PathBuf> },
    Failed { stage: CommitStage, error: String },
}

pub struct ArtifactCommitter<V> {
    vcs: V,
}

impl<V: Vcs> ArtifactCommitter<V> {
    pub fn new(vcs: V) -> Self {
        Self { vcs }
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Stage and commit the existing `files` if any of them changed
    pub async fn commit_if_changed(&self, repo_root: &Path, files: &[PathBuf], message: &str) -> CommitOutcome {
        let outcome = self.try_commit(repo_root, files, message).await;
        match &outcome {
            CommitOutcome::Committed { files } => info!("Committed {} artifact(s)", files.len()),
            CommitOutcome::Failed { stage, error } => {
                warn!(stage = ?stage, error = %error, "artifact commit failed")
            }
            CommitOutcome::NoArtifacts | CommitOutcome::Unchanged => {
                info!("No artifact changes to commit")
            }
        }
        outcome
    }

    async fn try_commit(&self, repo_root: &Path, files: &[PathBuf], message: &str) -> CommitOutcome {
        let existing: Vec<&PathBuf> = files.iter().filter(|p| p.exists()).collect();
        if existing.is_empty() {
            return CommitOutcome::NoArtifacts;
        }

        let relative = match relative_paths(repo_root, &existing) {
            Ok(paths) => paths,
            Err(error) => {
                return CommitOutcome::Failed {
                    stage: CommitStage::Resolve,
                    error,
                }
            }
        };

        match self.vcs.has_changes(repo_root, &relative).await {
            Ok(true) => {}
            Ok(false) => return CommitOutcome::Unchanged,
            Err(e) => {
                return CommitOutcome::Failed {
                    stage: CommitStage::Status,
                    error: e.to_string(),
                }
            }
        }

        if let Err(e) = self.vcs.add(repo_root, &relative).await {
            return CommitOutcome::Failed {
                stage: CommitStage::Add,
                error: e.to_string(),
            };
        }

        if let Err(e) = self.vcs.commit(repo_root, message).await {
            return CommitOutcome::Failed {
                stage: CommitStage::Commit,
                error: e.to_string(),
            };
        }

        CommitOutcome::Committed { files: relative }
    }
}

/// Express each path relative to the repository root
fn relative_paths(repo_root: &Path, files: &[&PathBuf]) -> Result<Vec<PathBuf>, String> {
    let root = std::fs::canonicalize(repo_root)
        .map_err(|e| format!("cannot resolve repository root {}: {e}", repo_root.display()))?;

    files
        .iter()
        .map(|file| {
            let absolute = std::fs::canonicalize(file)
                .map_err(|e| format!("cannot resolve {}: {e}", file.display()))?;
            absolute
                .strip_prefix(&root)
                .map(Path::to_path_buf)
                .map_err(|_| format!("{} is outside {}", file.display(), root.display()))
        })
        .collect()
}
