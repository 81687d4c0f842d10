use bollard::models::{ContainerCreateBody, HostConfig, PortBinding};
use bollard::query_parameters::{
    CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::Docker;
use std::collections::HashMap;

use super::{map_docker_error, ContainerInfo, ContainerSpec, ContainerSummary};
use crate::error::Result;

/// Port mapping: (container_port, host_port).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMap {
    pub container_port: u16,
    pub host_port: u16,
}

/// Replaces the image's command so the container idles until stopped,
/// the way devcontainer tooling does by default.
const KEEP_ALIVE: &str = "trap 'exit 0' TERM; while sleep 1000 & wait $!; do :; done";

/// Create a Docker container from `spec`, returning its id.
pub async fn create_container(docker: &Docker, spec: &ContainerSpec) -> Result<String> {
    let env: Vec<String> = spec
        .env
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    let mut exposed_ports: Vec<String> = Vec::new();
    for pm in &spec.ports {
        let container_port_key = format!("{}/tcp", pm.container_port);
        port_bindings.insert(
            container_port_key.clone(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(pm.host_port.to_string()),
            }]),
        );
        exposed_ports.push(container_port_key);
    }

    let binds: Vec<String> = spec
        .mount
        .iter()
        .map(|m| format!("{}:{}", m.source.display(), m.target))
        .collect();

    let host_config = HostConfig {
        port_bindings: Some(port_bindings),
        binds: Some(binds),
        ..Default::default()
    };

    let config = ContainerCreateBody {
        image: Some(spec.image.clone()),
        env: Some(env),
        exposed_ports: Some(exposed_ports),
        host_config: Some(host_config),
        labels: Some(spec.labels.clone()),
        entrypoint: Some(vec!["/bin/sh".to_string(), "-c".to_string()]),
        cmd: Some(vec![KEEP_ALIVE.to_string()]),
        working_dir: spec.mount.as_ref().map(|m| m.target.clone()),
        ..Default::default()
    };

    let options = CreateContainerOptions {
        name: Some(spec.name.clone()),
        ..Default::default()
    };

    let response = docker
        .create_container(Some(options), config)
        .await
        .map_err(|e| map_docker_error(e, "image", &spec.image))?;

    tracing::debug!(
        container = %spec.name,
        id = %response.id,
        "container created"
    );

    Ok(response.id)
}

/// Start a container by ID.
pub async fn start_container(docker: &Docker, container_id: &str) -> Result<()> {
    docker
        .start_container(container_id, None::<StartContainerOptions>)
        .await
        .map_err(|e| map_docker_error(e, "container", container_id))
}

/// Stop a container by name or ID with a timeout. Stopping an already
/// stopped container is not an error.
pub async fn stop_container(docker: &Docker, container_id: &str, timeout_secs: i32) -> Result<()> {
    let options = StopContainerOptions {
        t: Some(timeout_secs),
        signal: None,
    };
    match docker.stop_container(container_id, Some(options)).await {
        Ok(()) => Ok(()),
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 304, ..
        }) => Ok(()),
        Err(e) => Err(map_docker_error(e, "container", container_id)),
    }
}

/// Remove a container by name or ID.
pub async fn remove_container(docker: &Docker, container_id: &str, force: bool) -> Result<()> {
    let options = RemoveContainerOptions {
        force,
        ..Default::default()
    };
    docker
        .remove_container(container_id, Some(options))
        .await
        .map_err(|e| map_docker_error(e, "container", container_id))
}

/// Inspect a container. A missing container is reported as `NotFound`.
pub async fn inspect_container(docker: &Docker, container_id: &str) -> Result<ContainerInfo> {
    let response = docker
        .inspect_container(container_id, None::<InspectContainerOptions>)
        .await
        .map_err(|e| map_docker_error(e, "container", container_id))?;

    let state = response.state.as_ref();
    Ok(ContainerInfo {
        id: response.id.clone().unwrap_or_else(|| container_id.to_string()),
        running: state.and_then(|s| s.running).unwrap_or(false),
    })
}

/// List all containers (running or not) carrying `label`, given as
/// `key=value`.
pub async fn list_containers_by_label(docker: &Docker, label: &str) -> Result<Vec<ContainerSummary>> {
    let filters = HashMap::from([("label".to_string(), vec![label.to_string()])]);
    let options = ListContainersOptions {
        all: true,
        filters: Some(filters),
        ..Default::default()
    };
    let containers = docker
        .list_containers(Some(options))
        .await
        .map_err(|e| map_docker_error(e, "containers", label))?;

    Ok(containers
        .into_iter()
        .filter_map(|c| c.id.map(|id| ContainerSummary { id }))
        .collect())
}
