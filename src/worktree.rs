use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Version-control worktree operations.
#[async_trait]
pub trait Worktrees: Send + Sync {
    /// Whether `path` is inside a repository work tree.
    async fn is_repository(&self, path: &Path) -> Result<bool>;

    /// Check out `branch` of `repo` at `dest`. A no-op when `dest` already
    /// exists. A missing branch is created from `base` (or `HEAD`).
    async fn create(&self, repo: &Path, branch: &str, dest: &Path, base: Option<&str>) -> Result<()>;

    async fn remove(&self, repo: &Path, dest: &Path) -> Result<()>;
}

/// [`Worktrees`] implemented with the `git` command line.
#[derive(Debug, Default, Clone)]
pub struct GitWorktrees;

async fn git(repo: &Path, args: &[&str]) -> Result<std::process::Output> {
    debug!(repo = %repo.display(), ?args, "running git");
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .await
        .map_err(|e| Error::external("git", None, format!("running git {}: {e}", args.join(" "))))
}

fn failure(args: &[&str], output: &std::process::Output) -> Error {
    Error::external(
        "git",
        None,
        format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ),
    )
}

#[async_trait]
impl Worktrees for GitWorktrees {
    async fn is_repository(&self, path: &Path) -> Result<bool> {
        if !path.is_dir() {
            return Ok(false);
        }
        let output = git(path, &["rev-parse", "--is-inside-work-tree"]).await?;
        Ok(output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true")
    }

    async fn create(&self, repo: &Path, branch: &str, dest: &Path, base: Option<&str>) -> Result<()> {
        if dest.exists() {
            debug!(dest = %dest.display(), "worktree already present");
            return Ok(());
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let branch_ref = format!("refs/heads/{branch}");
        let exists = git(repo, &["rev-parse", "--verify", "--quiet", &branch_ref])
            .await?
            .status
            .success();

        let dest_str = dest.to_string_lossy();
        let mut args = vec!["worktree", "add"];
        if exists {
            args.extend([&*dest_str, branch]);
        } else {
            args.extend(["-b", branch, &*dest_str]);
            if let Some(base) = base {
                args.push(base);
            }
        }

        let output = git(repo, &args).await?;
        if !output.status.success() {
            return Err(failure(&args, &output));
        }
        info!(branch = %branch, dest = %dest.display(), created_branch = !exists, "worktree created");
        Ok(())
    }

    async fn remove(&self, repo: &Path, dest: &Path) -> Result<()> {
        let dest_str = dest.to_string_lossy();
        let args = ["worktree", "remove", "--force", &*dest_str];
        let output = git(repo, &args).await?;
        if !output.status.success() {
            return Err(failure(&args, &output));
        }
        info!(dest = %dest.display(), "worktree removed");
        Ok(())
    }
}
