pub mod branch;
pub mod create;
pub mod lifecycle;
pub mod list;
pub mod serve;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::model::BranchboxConfig;
use crate::docker::DockerRuntime;
use crate::orchestrator::Orchestrator;
use crate::proxy::CaddyAdmin;
use crate::store::Store;
use crate::worktree::GitWorktrees;

pub fn load_config(config_file: Option<&Path>) -> Result<BranchboxConfig> {
    crate::config::load_or_default(config_file)
}

pub fn open_store(config: &BranchboxConfig) -> Result<Arc<Store>> {
    let path = config.database_path();
    let store = Store::open(&path)
        .with_context(|| format!("opening state database {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Wire the orchestrator to the real Docker, Caddy and git gateways.
pub fn build_orchestrator(config: &BranchboxConfig) -> Result<Orchestrator> {
    let store = open_store(config)?;
    let runtime = DockerRuntime::connect(config.docker.stop_timeout_secs)?;
    let proxy = CaddyAdmin::new(&config.proxy.admin_url, &config.proxy.server);
    Ok(Orchestrator::new(
        config,
        store,
        Arc::new(runtime),
        Arc::new(proxy),
        Arc::new(GitWorktrees),
    ))
}
