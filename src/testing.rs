//! In-memory gateways for tests.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::docker::{ContainerInfo, ContainerRuntime, ContainerSpec, ContainerSummary};
use crate::error::{Error, Result};
use crate::proxy::{ProxyAdmin, Route};
use crate::worktree::Worktrees;

// ---------------------------------------------------------------------------
// Container runtime
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub spec: ContainerSpec,
    pub running: bool,
}

#[derive(Default)]
struct RuntimeState {
    containers: BTreeMap<String, FakeContainer>,
    next_id: u64,
    images: HashSet<String>,
    pulls: Vec<String>,
    fail_create: Option<Error>,
    fail_start: Option<Error>,
}

#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<RuntimeState>,
}

impl FakeRuntime {
    fn state(&self) -> std::sync::MutexGuard<'_, RuntimeState> {
        self.state.lock().unwrap()
    }

    pub fn containers(&self) -> Vec<(String, FakeContainer)> {
        self.state()
            .containers
            .iter()
            .map(|(id, c)| (id.clone(), c.clone()))
            .collect()
    }

    pub fn container(&self, id: &str) -> Option<FakeContainer> {
        self.state().containers.get(id).cloned()
    }

    /// Remove a container behind the orchestrator's back.
    pub fn forget(&self, id: &str) {
        self.state().containers.remove(id);
    }

    /// Stop a container behind the orchestrator's back.
    pub fn halt(&self, id: &str) {
        if let Some(c) = self.state().containers.get_mut(id) {
            c.running = false;
        }
    }

    pub fn fail_next_create(&self, err: Error) {
        self.state().fail_create = Some(err);
    }

    pub fn fail_next_start(&self, err: Error) {
        self.state().fail_start = Some(err);
    }

    pub fn pulls(&self) -> Vec<String> {
        self.state().pulls.clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        let mut state = self.state();
        if let Some(err) = state.fail_create.take() {
            return Err(err);
        }
        if state.containers.values().any(|c| c.spec.name == spec.name) {
            return Err(Error::external(
                "docker",
                Some(409),
                format!("container name \"/{}\" is already in use", spec.name),
            ));
        }
        state.next_id += 1;
        let id = format!("fake{:08}", state.next_id);
        state.containers.insert(
            id.clone(),
            FakeContainer {
                spec: spec.clone(),
                running: false,
            },
        );
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        let mut state = self.state();
        if let Some(err) = state.fail_start.take() {
            return Err(err);
        }
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| Error::not_found("container", id))?;
        container.running = true;
        Ok(())
    }

    async fn stop(&self, id: &str) -> Result<()> {
        let mut state = self.state();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| Error::not_found("container", id))?;
        container.running = false;
        Ok(())
    }

    async fn remove(&self, id: &str, force: bool) -> Result<()> {
        let mut state = self.state();
        let running = state
            .containers
            .get(id)
            .ok_or_else(|| Error::not_found("container", id))?
            .running;
        if running && !force {
            return Err(Error::external("docker", Some(409), "container is running"));
        }
        state.containers.remove(id);
        Ok(())
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInfo> {
        let state = self.state();
        let container = state
            .containers
            .get(id)
            .ok_or_else(|| Error::not_found("container", id))?;
        Ok(ContainerInfo {
            id: id.to_string(),
            running: container.running,
        })
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        Ok(self.state().images.contains(image))
    }

    async fn pull(&self, image: &str) -> Result<()> {
        let mut state = self.state();
        state.images.insert(image.to_string());
        state.pulls.push(image.to_string());
        Ok(())
    }

    async fn list(&self, label: &str) -> Result<Vec<ContainerSummary>> {
        let (key, value) = label.split_once('=').unwrap_or((label, ""));
        Ok(self
            .state()
            .containers
            .iter()
            .filter(|(_, c)| c.spec.labels.get(key).map(String::as_str) == Some(value))
            .map(|(id, _)| ContainerSummary { id: id.clone() })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Proxy admin
// ---------------------------------------------------------------------------

struct ProxyState {
    routes: Option<Vec<Route>>,
    calls: Vec<String>,
    conflict_on_put_collection: bool,
    fail_put_route: Option<Error>,
}

/// Mimics the Caddy admin API: no primitive is idempotent on its own.
pub struct FakeProxy {
    state: Mutex<ProxyState>,
}

impl Default for FakeProxy {
    fn default() -> Self {
        Self::with_routes(Some(Vec::new()))
    }
}

impl FakeProxy {
    fn with_routes(routes: Option<Vec<Route>>) -> Self {
        Self {
            state: Mutex::new(ProxyState {
                routes,
                calls: Vec::new(),
                conflict_on_put_collection: false,
                fail_put_route: None,
            }),
        }
    }

    pub fn without_collection() -> Self {
        Self::with_routes(None)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ProxyState> {
        self.state.lock().unwrap()
    }

    /// Another writer creates the collection just before our next PUT.
    pub fn fail_next_put_collection_with_conflict(&self) {
        self.state().conflict_on_put_collection = true;
    }

    pub fn fail_next_put_route(&self, err: Error) {
        self.state().fail_put_route = Some(err);
    }

    pub fn routes(&self) -> Option<Vec<Route>> {
        self.state().routes.clone()
    }

    pub fn route(&self, id: &str) -> Option<Route> {
        self.state()
            .routes
            .as_ref()
            .and_then(|routes| routes.iter().find(|r| r.id == id).cloned())
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }
}

#[async_trait]
impl ProxyAdmin for FakeProxy {
    async fn get_collection(&self) -> Result<Vec<Value>> {
        let mut state = self.state();
        state.calls.push("get_collection".to_string());
        match &state.routes {
            None => Err(Error::not_found("route collection", "branchbox")),
            Some(routes) => Ok(routes
                .iter()
                .map(|r| serde_json::to_value(r))
                .collect::<std::result::Result<_, _>>()?),
        }
    }

    async fn put_collection(&self, routes: &[Route]) -> Result<()> {
        let mut state = self.state();
        state.calls.push("put_collection".to_string());
        if state.conflict_on_put_collection {
            state.conflict_on_put_collection = false;
            state.routes.get_or_insert_with(Vec::new);
            return Err(Error::external("caddy", Some(409), "key already exists"));
        }
        if state.routes.is_some() {
            return Err(Error::external("caddy", Some(409), "key already exists"));
        }
        state.routes = Some(routes.to_vec());
        Ok(())
    }

    async fn put_route(&self, id: &str, route: &Route) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("put_route {id}"));
        if let Some(err) = state.fail_put_route.take() {
            return Err(err);
        }
        let existing = state
            .routes
            .as_mut()
            .and_then(|routes| routes.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| Error::not_found("route", id))?;
        *existing = route.clone();
        Ok(())
    }

    async fn post_route(&self, route: &Route) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("post_route {}", route.id));
        let routes = state
            .routes
            .as_mut()
            .ok_or_else(|| Error::not_found("route collection", "branchbox"))?;
        routes.push(route.clone());
        Ok(())
    }

    async fn delete_route(&self, id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("delete_route {id}"));
        let routes = state
            .routes
            .as_mut()
            .ok_or_else(|| Error::not_found("route", id))?;
        let index = routes
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| Error::not_found("route", id))?;
        routes.remove(index);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Worktrees
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedWorktree {
    pub repo: PathBuf,
    pub branch: String,
    pub dest: PathBuf,
    pub base: Option<String>,
}

#[derive(Default)]
struct WorktreeState {
    reject_repositories: bool,
    created: Vec<CreatedWorktree>,
}

/// Worktrees as plain directories. Creating one yields once, then copies the
/// repository's devcontainer definition, standing in for a checkout of
/// tracked files.
#[derive(Default)]
pub struct FakeWorktrees {
    state: Mutex<WorktreeState>,
}

impl FakeWorktrees {
    pub fn rejecting_repositories() -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().reject_repositories = true;
        fake
    }

    pub fn created(&self) -> Vec<CreatedWorktree> {
        self.state.lock().unwrap().created.clone()
    }
}

const TRACKED: &[&str] = &[".devcontainer/devcontainer.json", ".devcontainer.json"];

#[async_trait]
impl Worktrees for FakeWorktrees {
    async fn is_repository(&self, path: &Path) -> Result<bool> {
        Ok(path.is_dir() && !self.state.lock().unwrap().reject_repositories)
    }

    async fn create(&self, repo: &Path, branch: &str, dest: &Path, base: Option<&str>) -> Result<()> {
        // Real checkouts suspend here; give concurrent callers a chance to run.
        tokio::task::yield_now().await;
        if dest.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(dest)?;
        for tracked in TRACKED {
            let source = repo.join(tracked);
            if source.is_file() {
                let target = dest.join(tracked);
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(&source, &target)?;
            }
        }
        self.state.lock().unwrap().created.push(CreatedWorktree {
            repo: repo.to_path_buf(),
            branch: branch.to_string(),
            dest: dest.to_path_buf(),
            base: base.map(str::to_string),
        });
        Ok(())
    }

    async fn remove(&self, _repo: &Path, dest: &Path) -> Result<()> {
        if dest.exists() {
            std::fs::remove_dir_all(dest)?;
        }
        Ok(())
    }
}
