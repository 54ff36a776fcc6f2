//! Git CLI subprocess client

use crate::vcs::{Vcs, VcsError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Client for running `git` as a subprocess
#[derive(Debug, Clone)]
pub struct GitCli {
    /// Path to git executable
    git_path: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git".to_string())
    }
}

impl GitCli {
    /// Create a new git client
    ///
    /// # Arguments
    /// * `git_path` - Path to git executable (e.g., "git", "/usr/bin/git")
    pub fn new(git_path: String) -> Self {
        Self { git_path }
    }

    /// Run `git -C <repo_root> <args>` and return stdout.
    ///
    /// # Errors
    /// Returns `VcsError` if git cannot be spawned or exits with a non-zero status.
    async fn run(&self, repo_root: &Path, args: Vec<OsString>) -> Result<String, VcsError> {
        let label = format!(
            "git {}",
            args.first().map(|a| a.to_string_lossy().into_owned()).unwrap_or_default()
        );
        debug!("Running {} in {}", label, repo_root.display());

        let output = Command::new(&self.git_path)
            .arg("-C")
            .arg(repo_root)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| VcsError::Spawn {
                program: self.git_path.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(VcsError::Command {
                command: label,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn with_pathspec(args: &[&str], paths: &[PathBuf]) -> Vec<OsString> {
    args.iter()
        .map(OsString::from)
        .chain(std::iter::once(OsString::from("--")))
        .chain(paths.iter().map(|p| p.clone().into_os_string()))
        .collect()
}

#[async_trait]
impl Vcs for GitCli {
    async fn has_changes(&self, repo_root: &Path, paths: &[PathBuf]) -> Result<bool, VcsError> {
        let stdout = self
            .run(repo_root, with_pathspec(&["status", "--porcelain"], paths))
            .await?;
        Ok(!stdout.trim().is_empty())
    }

    async fn add(&self, repo_root: &Path, paths: &[PathBuf]) -> Result<(), VcsError> {
        self.run(repo_root, with_pathspec(&["add"], paths)).await?;
        Ok(())
    }

    async fn commit(&self, repo_root: &Path, message: &str) -> Result<(), VcsError> {
        self.run(
            repo_root,
            vec![OsString::from("commit"), OsString::from("-m"), OsString::from(message)],
        )
        .await?;
        Ok(())
    }
}
