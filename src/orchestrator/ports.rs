use crate::error::Result;
use crate::identity::slugify;
use crate::store::model::PortMapping;
use crate::store::Store;

/// Hands out host ports and derives hostnames for forwarded container ports.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    range_start: u16,
    default_container_port: u16,
    domain: String,
}

impl PortAllocator {
    pub fn new(range_start: u16, default_container_port: u16, domain: impl Into<String>) -> Self {
        Self {
            range_start,
            default_container_port,
            domain: domain.into(),
        }
    }

    /// The port the next allocation would receive if nothing else
    /// allocates first.
    pub fn next_host_port(&self, store: &Store) -> Result<u16> {
        store.next_host_port(self.range_start)
    }

    /// `<project>-<branch>[--<port>].<domain>`; the port suffix is left out
    /// for the default container port. Slugs never contain `--`, so the
    /// suffix cannot be mistaken for part of a branch name.
    pub fn hostname(&self, project: &str, branch: &str, container_port: u16) -> String {
        let mut label = format!("{}-{}", slugify(project), slugify(branch));
        if container_port != self.default_container_port {
            label.push_str("--");
            label.push_str(&container_port.to_string());
        }
        format!("{label}.{}", self.domain)
    }

    /// Allocate a host port and hostname for `container_port` and persist
    /// the mapping. Port selection and insert happen atomically in the store.
    pub fn allocate(
        &self,
        store: &Store,
        environment_id: i64,
        project: &str,
        branch: &str,
        container_port: u16,
    ) -> Result<PortMapping> {
        let hostname = self.hostname(project, branch, container_port);
        let mapping =
            store.allocate_port_mapping(environment_id, container_port, &hostname, self.range_start)?;
        tracing::debug!(
            container_port,
            host_port = mapping.host_port,
            hostname = %mapping.hostname,
            "port allocated"
        );
        Ok(mapping)
    }
}
