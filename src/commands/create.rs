use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::ui::summary::print_environment_ready;
use crate::worktree::{GitWorktrees, Worktrees};

pub async fn run(config_file: Option<&Path>, repo: Option<PathBuf>, branch: &str) -> Result<()> {
    let repo = match repo {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    // Fail fast before touching Docker.
    if !GitWorktrees.is_repository(&repo).await? {
        bail!("{} is not a git repository", repo.display());
    }

    let config = super::load_config(config_file)?;
    let orchestrator = super::build_orchestrator(&config)?;
    let record = orchestrator.create(&repo, branch).await?;
    print_environment_ready(&record);
    Ok(())
}
