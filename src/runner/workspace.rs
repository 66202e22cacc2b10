//! Per-task workspace preparation.
//!
//! Each task run owns `<root>/<task id>`. The directory is destroyed and
//! recreated at the start of every run, then populated by cloning the task's
//! repository at the pinned commit.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use super::process::{run_with_timeout, ProcessError};
use crate::error::{BenchError, Result};
use crate::task::Task;

/// Upper bound for a single git invocation.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Commit names that mean "whatever the clone checked out".
const DEFAULT_REFS: &[&str] = &["main", "master", "HEAD"];

/// Creates and removes task workspaces under a root directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, task: &Task) -> PathBuf {
        self.root.join(&task.id)
    }

    /// Like [`path_for`](Self::path_for), but refuses ids that would resolve
    /// anywhere other than a direct child of the root.
    fn owned_path(&self, task: &Task) -> Result<PathBuf> {
        let mut components = Path::new(&task.id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == task.id.as_str() => {
                Ok(self.root.join(name))
            }
            _ => Err(BenchError::InvalidTaskFormat(format!(
                "Task ID '{}' does not name a workspace directory",
                task.id
            ))),
        }
    }

    /// Returns a fresh workspace for `task`, discarding any previous one.
    pub async fn prepare(&self, task: &Task) -> Result<PathBuf> {
        let path = self.owned_path(task)?;

        if tokio::fs::try_exists(&path).await? {
            debug!("Removing stale workspace {}", path.display());
            tokio::fs::remove_dir_all(&path).await?;
        }

        if task.has_repository() {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            info!("Cloning {} into {}", task.source.repository, path.display());
            let mut clone = Command::new("git");
            clone.arg("clone").arg(&task.source.repository).arg(&path);
            run_git(clone, "clone").await?;

            let commit = task.source.commit.as_str();
            if !commit.is_empty() && !DEFAULT_REFS.contains(&commit) {
                debug!("Checking out {}", commit);
                let mut checkout = Command::new("git");
                checkout.arg("checkout").arg(commit).current_dir(&path);
                run_git(checkout, "checkout").await?;
            }
        } else {
            tokio::fs::create_dir_all(&path).await?;
        }

        Ok(path)
    }

    /// Removes the workspace for `task` if it exists.
    pub async fn cleanup(&self, task: &Task) -> Result<()> {
        let path = self.owned_path(task)?;
        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_dir_all(&path).await?;
        }
        Ok(())
    }
}

async fn run_git(cmd: Command, action: &str) -> Result<()> {
    let output = run_with_timeout(cmd, GIT_TIMEOUT).await.map_err(|e| match e {
        ProcessError::Timeout(d) => BenchError::Timeout(d),
        other => BenchError::GitOperation(format!("git {}: {}", action, other)),
    })?;

    if !output.success() {
        return Err(BenchError::GitOperation(format!(
            "git {} failed: {}",
            action,
            output.stderr.trim()
        )));
    }
    Ok(())
}
