pub mod container;
pub mod image;

use async_trait::async_trait;
use bollard::Docker;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{Error, Result};
pub use container::PortMap;

/// Label carrying the owning environment's name on every container we create.
pub const LABEL_ENVIRONMENT: &str = "branchbox.environment";
pub const LABEL_MANAGED: &str = "branchbox.managed";

/// Labels attached to an environment's container.
pub fn environment_labels(environment: &str) -> HashMap<String, String> {
    HashMap::from([
        (LABEL_MANAGED.to_string(), "true".to_string()),
        (LABEL_ENVIRONMENT.to_string(), environment.to_string()),
    ])
}

/// Label filter selecting an environment's containers.
pub fn environment_label_filter(environment: &str) -> String {
    format!("{LABEL_ENVIRONMENT}={environment}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: String,
}

/// Everything needed to create one environment container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub mount: Option<BindMount>,
    pub env: Vec<(String, String)>,
    pub labels: HashMap<String, String>,
    pub ports: Vec<PortMap>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
}

/// Container engine operations the orchestrator depends on.
///
/// Implementations report a missing container (or image) as
/// [`Error::NotFound`]; every other failure is an
/// [`Error::ExternalService`].
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn create(&self, spec: &ContainerSpec) -> Result<String>;
    async fn start(&self, id: &str) -> Result<()>;
    async fn stop(&self, id: &str) -> Result<()>;
    async fn remove(&self, id: &str, force: bool) -> Result<()>;
    async fn inspect(&self, id: &str) -> Result<ContainerInfo>;
    async fn image_exists(&self, image: &str) -> Result<bool>;
    async fn pull(&self, image: &str) -> Result<()>;
    async fn list(&self, label: &str) -> Result<Vec<ContainerSummary>>;
}

pub(crate) fn map_docker_error(err: bollard::errors::Error, kind: &'static str, name: &str) -> Error {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => Error::not_found(kind, name),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => Error::external("docker", Some(status_code), message),
        other => Error::external("docker", None, other.to_string()),
    }
}

/// [`ContainerRuntime`] backed by the local Docker daemon.
pub struct DockerRuntime {
    docker: Docker,
    stop_timeout_secs: i32,
}

impl DockerRuntime {
    /// Create a client for the local daemon. No request is made until the
    /// first operation.
    pub fn connect(stop_timeout_secs: i32) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::external("docker", None, format!("connecting to Docker daemon: {e}")))?;
        Ok(Self {
            docker,
            stop_timeout_secs,
        })
    }

    /// Check that the Docker daemon is reachable.
    pub async fn ping(&self) -> Result<()> {
        self.docker.ping().await.map_err(|e| {
            Error::external(
                "docker",
                None,
                format!("Cannot connect to Docker daemon. Is Docker running? ({e})"),
            )
        })?;
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        container::create_container(&self.docker, spec).await
    }

    async fn start(&self, id: &str) -> Result<()> {
        container::start_container(&self.docker, id).await
    }

    async fn stop(&self, id: &str) -> Result<()> {
        container::stop_container(&self.docker, id, self.stop_timeout_secs).await
    }

    async fn remove(&self, id: &str, force: bool) -> Result<()> {
        container::remove_container(&self.docker, id, force).await
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInfo> {
        container::inspect_container(&self.docker, id).await
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        image::check_image_exists(&self.docker, image).await
    }

    async fn pull(&self, image: &str) -> Result<()> {
        image::pull_image(&self.docker, image).await
    }

    async fn list(&self, label: &str) -> Result<Vec<ContainerSummary>> {
        container::list_containers_by_label(&self.docker, label).await
    }
}
