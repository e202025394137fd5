//! Git worktree provisioning for isolated task execution.
//!
//! A task running in worktree mode gets its own working tree at
//! `.worktrees/do-{task-id}/` on a fresh branch `do/{task-id}`. Externally
//! provisioned trees (the `AGENTX_WORKTREE` path) are validated and reused
//! instead. Worktrees are never destroyed here; cleanup belongs to the
//! invoking workflow, where deleting work-in-progress is a deliberate act.

use crate::error::AgentXError;
use crate::Result;
use log::debug;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// A provisioned or reused working tree.
#[derive(Debug, Clone)]
pub struct WorktreeHandle {
    /// Task this tree belongs to.
    pub task_id: String,
    /// Absolute path of the working tree.
    pub path: PathBuf,
    /// Branch checked out in the tree (empty for reused trees).
    pub branch: String,
    /// Whether the tree was supplied externally rather than created here.
    pub reused: bool,
}

/// Provisions and validates git worktrees.
pub struct WorktreeManager;

impl WorktreeManager {
    /// Create a new worktree for a task under the repository containing
    /// `base_dir`.
    ///
    /// # Errors
    ///
    /// - [`AgentXError::PreconditionFailed`] when `base_dir` is not inside
    ///   a git repository
    /// - [`AgentXError::WorktreeConflict`] when branch `do/{task_id}`
    ///   already exists
    /// - [`AgentXError::Io`] on filesystem failures
    pub async fn provision(base_dir: &Path, task_id: &str) -> Result<WorktreeHandle> {
        let repo_root = Self::repo_root(base_dir).await?;
        let branch = format!("do/{}", task_id);

        if Self::branch_exists(&repo_root, &branch).await? {
            return Err(AgentXError::WorktreeConflict { branch });
        }

        let tree_path = repo_root.join(".worktrees").join(format!("do-{}", task_id));
        if let Some(parent) = tree_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        debug!(
            "provisioning worktree for {} at {}",
            task_id,
            tree_path.display()
        );
        let output = Command::new("git")
            .arg("-C")
            .arg(&repo_root)
            .arg("worktree")
            .arg("add")
            .arg("-b")
            .arg(&branch)
            .arg(&tree_path)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("already exists") {
                return Err(AgentXError::WorktreeConflict { branch });
            }
            return Err(AgentXError::precondition_failed(format!(
                "git worktree add failed: {}",
                stderr.trim()
            )));
        }

        let path = tree_path.canonicalize()?;
        Ok(WorktreeHandle {
            task_id: task_id.to_string(),
            path,
            branch,
            reused: false,
        })
    }

    /// Validate and adopt an externally-supplied worktree path.
    ///
    /// # Errors
    ///
    /// Returns [`AgentXError::PreconditionFailed`] when the path does not
    /// exist or is not a git working tree.
    pub async fn reuse(path: &Path, task_id: &str) -> Result<WorktreeHandle> {
        if !path.is_dir() {
            return Err(AgentXError::precondition_failed(format!(
                "external worktree path does not exist: {}",
                path.display()
            )));
        }
        let output = Command::new("git")
            .arg("-C")
            .arg(path)
            .arg("rev-parse")
            .arg("--is-inside-work-tree")
            .output()
            .await?;
        if !output.status.success()
            || String::from_utf8_lossy(&output.stdout).trim() != "true"
        {
            return Err(AgentXError::precondition_failed(format!(
                "external worktree path is not a git working tree: {}",
                path.display()
            )));
        }
        let path = path.canonicalize()?;
        Ok(WorktreeHandle {
            task_id: task_id.to_string(),
            path,
            branch: String::new(),
            reused: true,
        })
    }

    /// Resolve the repository top level containing `dir`.
    async fn repo_root(dir: &Path) -> Result<PathBuf> {
        let output = Command::new("git")
            .arg("-C")
            .arg(dir)
            .arg("rev-parse")
            .arg("--show-toplevel")
            .output()
            .await?;
        if !output.status.success() {
            return Err(AgentXError::precondition_failed(format!(
                "worktree mode requires a git repository, but {} is not inside one",
                dir.display()
            )));
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(PathBuf::from(root))
    }

    /// Check whether a local branch already exists.
    async fn branch_exists(repo_root: &Path, branch: &str) -> Result<bool> {
        let output = Command::new("git")
            .arg("-C")
            .arg(repo_root)
            .arg("rev-parse")
            .arg("--verify")
            .arg("--quiet")
            .arg(format!("refs/heads/{}", branch))
            .output()
            .await?;
        Ok(output.status.success())
    }
}
