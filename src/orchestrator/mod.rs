pub mod ports;


use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::model::BranchboxConfig;
use crate::devcontainer::{self, RuntimeConfig, RuntimeDefaults};
use crate::docker::{
    environment_label_filter, environment_labels, BindMount, ContainerRuntime, ContainerSpec,
    PortMap,
};
use crate::envfiles;
use crate::error::{Error, Result};
use crate::identity::{environment_name, ProjectIdentity};
use crate::proxy::{ProxyAdmin, RouteSynchronizer};
use crate::store::model::{Environment, EnvironmentRecord, EnvironmentStatus, PortMapping, Project};
use crate::store::Store;
use crate::worktree::Worktrees;

use ports::PortAllocator;

/// Container name for an environment.
pub fn container_name(environment: &str) -> String {
    format!("branchbox-{environment}")
}

/// Drives environments through `Created → Running ⇄ Stopped` (and `Error`)
/// while keeping the store consistent with Docker, the proxy and git.
///
/// A recorded status is only a hint: every status-sensitive operation checks
/// the container runtime before trusting it. Nothing is rolled back on
/// failure; instead every operation can be re-run and converges:
///   1. Verify: reconcile the recorded status with the runtime
///   2. Worktree and env files (no-ops when already present)
///   3. Clear and reallocate port mappings
///   4. Replace the container, record its id, start it
///   5. Upsert routes one by one, then mark `Running`
pub struct Orchestrator {
    store: Arc<Store>,
    runtime: Arc<dyn ContainerRuntime>,
    worktrees: Arc<dyn Worktrees>,
    routes: RouteSynchronizer,
    ports: PortAllocator,
    worktrees_root: PathBuf,
    defaults: RuntimeDefaults,
}

impl Orchestrator {
    pub fn new(
        config: &BranchboxConfig,
        store: Arc<Store>,
        runtime: Arc<dyn ContainerRuntime>,
        proxy: Arc<dyn ProxyAdmin>,
        worktrees: Arc<dyn Worktrees>,
    ) -> Self {
        Self {
            store,
            runtime,
            worktrees,
            routes: RouteSynchronizer::new(proxy, config.proxy.upstream_host.clone()),
            ports: PortAllocator::new(
                config.ports.range_start,
                config.ports.default_container_port,
                config.proxy.domain.clone(),
            ),
            worktrees_root: config.worktrees_root(),
            defaults: RuntimeDefaults {
                image: config.docker.default_image.clone(),
                container_port: config.ports.default_container_port,
            },
        }
    }

    /// Create (or resume creating) the environment for `branch` of the
    /// repository at `repo`.
    ///
    /// An existing environment is reused. One recorded as running is first
    /// checked against the runtime: if its container is really running the
    /// call fails with `Conflict`; otherwise the record is demoted to
    /// `Stopped` and its container replaced.
    pub async fn create(&self, repo: &Path, branch: &str) -> Result<EnvironmentRecord> {
        let branch = validate_branch(branch)?;
        if !self.worktrees.is_repository(repo).await? {
            return Err(Error::Validation(format!(
                "{} is not a git repository",
                repo.display()
            )));
        }

        let identity = ProjectIdentity::from_repo(repo)?;
        let project = self.store.ensure_project(&identity.name, &identity.repo_path)?;
        if project.repo_path != identity.repo_path {
            return Err(Error::Conflict(format!(
                "project '{}' is already registered for {}",
                project.name,
                project.repo_path.display()
            )));
        }

        let name = environment_name(&project.name, branch);
        let (env, replace) = self.claim(&project, &name, branch).await?;

        let result = async {
            let worktree = self.worktrees_root.join(&env.name);
            self.worktrees
                .create(&project.repo_path, branch, &worktree, None)
                .await?;
            self.store.set_worktree_path(env.id, &worktree)?;

            for (path, content) in envfiles::discover(&project.repo_path)? {
                self.store.upsert_env_file(env.id, &path, &content)?;
            }
            self.copy_env_files(env.id, &worktree)?;

            let runtime_config = devcontainer::load_runtime_config(&worktree, &self.defaults)?;
            self.store.set_runtime_config(env.id, &runtime_config)?;

            self.provision(&project, &env, &worktree, &runtime_config, replace)
                .await
        }
        .await;

        self.settle(&env, result)
    }

    /// Create a new environment for `new_branch` in the project of `source`,
    /// reusing the source's env files and runtime configuration with fresh
    /// ports and hostnames. The source environment is left untouched.
    pub async fn branch(&self, source: &str, new_branch: &str) -> Result<EnvironmentRecord> {
        let new_branch = validate_branch(new_branch)?;
        let source_env = self.require(source)?;
        let project = self.store.get_project(source_env.project_id)?;

        let name = environment_name(&project.name, new_branch);
        if name == source_env.name {
            return Err(Error::Validation(format!(
                "branch '{new_branch}' maps to the source environment '{source}' itself"
            )));
        }
        let (env, replace) = self.claim(&project, &name, new_branch).await?;

        let result = async {
            let worktree = self.worktrees_root.join(&env.name);
            self.worktrees
                .create(
                    &project.repo_path,
                    new_branch,
                    &worktree,
                    Some(&source_env.branch),
                )
                .await?;
            self.store.set_worktree_path(env.id, &worktree)?;

            for file in self.store.list_env_files(source_env.id)? {
                self.store
                    .upsert_env_file(env.id, &file.relative_path, &file.content)?;
            }
            self.copy_env_files(env.id, &worktree)?;

            let runtime_config = match &source_env.runtime_config {
                Some(config) => config.clone(),
                None => devcontainer::load_runtime_config(&worktree, &self.defaults)?,
            };
            self.store.set_runtime_config(env.id, &runtime_config)?;

            self.provision(&project, &env, &worktree, &runtime_config, replace)
                .await
        }
        .await;

        self.settle(&env, result)
    }

    /// Start the recorded container of `name` and restore its routes.
    pub async fn start(&self, name: &str) -> Result<EnvironmentRecord> {
        let env = self.require(name)?;
        let container_id = recorded_container(&env)?;

        let result = async {
            self.runtime.start(&container_id).await?;
            self.store
                .update_environment_status(env.id, EnvironmentStatus::Running)?;
            let mappings = self.store.list_port_mappings(env.id)?;
            self.routes.sync_environment(&env.name, &mappings).await?;
            info!(env = %env.name, "environment started");
            self.get(&env.name)
        }
        .await;

        self.settle(&env, result)
    }

    /// Stop the recorded container of `name` and withdraw its routes.
    pub async fn stop(&self, name: &str) -> Result<EnvironmentRecord> {
        let env = self.require(name)?;
        let container_id = recorded_container(&env)?;

        let result = async {
            self.runtime.stop(&container_id).await?;
            self.store
                .update_environment_status(env.id, EnvironmentStatus::Stopped)?;
            let mappings = self.store.list_port_mappings(env.id)?;
            self.routes.remove_environment(&env.name, &mappings).await?;
            info!(env = %env.name, "environment stopped");
            self.get(&env.name)
        }
        .await;

        self.settle(&env, result)
    }

    /// Every environment with its port mappings.
    pub fn list(&self) -> Result<Vec<EnvironmentRecord>> {
        self.store.list_environments(None)
    }

    pub fn get(&self, name: &str) -> Result<EnvironmentRecord> {
        let environment = self.require(name)?;
        let project = self.store.get_project(environment.project_id)?;
        let ports = self.store.list_port_mappings(environment.id)?;
        Ok(EnvironmentRecord {
            project: project.name,
            environment,
            ports,
        })
    }

    fn require(&self, name: &str) -> Result<Environment> {
        self.store
            .get_environment(name)?
            .ok_or_else(|| Error::not_found("environment", name))
    }

    /// Insert the environment row, or take over an existing one after
    /// verifying its recorded status. Returns whether the recorded container
    /// must be replaced.
    async fn claim(&self, project: &Project, name: &str, branch: &str) -> Result<(Environment, bool)> {
        let Some(mut env) = self.store.get_environment(name)? else {
            info!(env = %name, branch = %branch, "creating environment");
            let env = self.store.insert_environment(project.id, name, branch)?;
            return Ok((env, false));
        };

        if env.project_id != project.id {
            return Err(Error::Conflict(format!(
                "environment '{name}' belongs to another project"
            )));
        }
        // Distinct branch names can slug to the same environment name.
        if env.branch != branch {
            return Err(Error::Conflict(format!(
                "environment '{name}' already tracks branch '{}'",
                env.branch
            )));
        }

        if env.status != EnvironmentStatus::Running {
            info!(env = %name, status = %env.status, "resuming existing environment");
            return Ok((env, false));
        }

        let running = match &env.container_id {
            None => false,
            Some(id) => match self.runtime.inspect(id).await {
                Ok(container) => container.running,
                Err(e) if e.is_not_found() => false,
                Err(e) => return Err(e),
            },
        };
        if running {
            return Err(Error::Conflict(format!(
                "environment '{name}' is already running"
            )));
        }

        warn!(env = %name, "recorded as running but container is not; demoting to stopped");
        self.store
            .update_environment_status(env.id, EnvironmentStatus::Stopped)?;
        env.status = EnvironmentStatus::Stopped;
        Ok((env, true))
    }

    /// Shared tail of `create` and `branch`: reallocate ports, replace the
    /// container, register routes.
    async fn provision(
        &self,
        project: &Project,
        env: &Environment,
        worktree: &Path,
        runtime_config: &RuntimeConfig,
        replace: bool,
    ) -> Result<EnvironmentRecord> {
        let cleared = self.store.delete_port_mappings(env.id)?;
        if cleared > 0 {
            debug!(env = %env.name, cleared, "cleared previous port mappings");
        }

        let mut mappings: Vec<PortMapping> = Vec::with_capacity(runtime_config.forward_ports.len());
        for &container_port in &runtime_config.forward_ports {
            mappings.push(self.ports.allocate(
                &self.store,
                env.id,
                &project.name,
                &env.branch,
                container_port,
            )?);
        }

        let env_files = self.store.list_env_files(env.id)?;
        let mut vars = envfiles::root_variables(
            env_files
                .iter()
                .map(|f| (f.relative_path.as_str(), f.content.as_str())),
        );
        vars.extend(runtime_config.container_env.clone());

        let spec = ContainerSpec {
            name: container_name(&env.name),
            image: runtime_config.image.clone(),
            mount: Some(BindMount {
                source: worktree.to_path_buf(),
                target: runtime_config.workspace_folder.clone(),
            }),
            env: vars.into_iter().collect(),
            labels: environment_labels(&env.name),
            ports: mappings
                .iter()
                .map(|m| PortMap {
                    container_port: m.container_port,
                    host_port: m.host_port,
                })
                .collect(),
        };

        self.remove_stale_containers(env, replace).await?;

        if !self.runtime.image_exists(&spec.image).await? {
            self.runtime.pull(&spec.image).await?;
        }
        let container_id = self.runtime.create(&spec).await?;
        self.store.set_container_id(env.id, Some(&container_id))?;
        self.runtime.start(&container_id).await?;
        info!(env = %env.name, container = %spec.name, ports = mappings.len(), "container started");

        self.routes.sync_environment(&env.name, &mappings).await?;
        self.store
            .update_environment_status(env.id, EnvironmentStatus::Running)?;
        info!(env = %env.name, "environment running");

        self.get(&env.name)
    }

    /// Remove containers that would clash with the one about to be created:
    /// the recorded container when `replace` is set, plus anything still
    /// labeled for this environment (e.g. left by an interrupted attempt).
    async fn remove_stale_containers(&self, env: &Environment, replace: bool) -> Result<()> {
        let mut stale = BTreeSet::new();
        if replace {
            if let Some(id) = &env.container_id {
                stale.insert(id.clone());
            }
        }
        for container in self
            .runtime
            .list(&environment_label_filter(&env.name))
            .await?
        {
            stale.insert(container.id);
        }

        for id in stale {
            match self.runtime.remove(&id, true).await {
                Ok(()) => debug!(env = %env.name, container = %id, "removed stale container"),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn copy_env_files(&self, environment_id: i64, worktree: &Path) -> Result<()> {
        let files = self.store.list_env_files(environment_id)?;
        let written = envfiles::write_into(
            worktree,
            files
                .iter()
                .map(|f| (f.relative_path.as_str(), f.content.as_str())),
        )?;
        if written > 0 {
            debug!(worktree = %worktree.display(), files = written, "env files written");
        }
        Ok(())
    }

    /// Record `Error` for an environment whose operation failed, then hand
    /// the original result back.
    fn settle<T>(&self, env: &Environment, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            warn!(env = %env.name, error = %err, "operation failed");
            if let Err(e) = self
                .store
                .update_environment_status(env.id, EnvironmentStatus::Error)
            {
                warn!(env = %env.name, error = %e, "could not record error status");
            }
        }
        result
    }
}

fn validate_branch(branch: &str) -> Result<&str> {
    let branch = branch.trim();
    if branch.is_empty() || crate::identity::slugify(branch).is_empty() {
        return Err(Error::Validation(format!("invalid branch name '{branch}'")));
    }
    Ok(branch)
}

fn recorded_container(env: &Environment) -> Result<String> {
    env.container_id
        .clone()
        .ok_or_else(|| Error::not_found("container of environment", &env.name))
}
