use std::sync::Arc;

use tracing::{debug, info};

use super::{ProxyAdmin, Route};
use crate::error::Result;
use crate::store::model::PortMapping;

/// Deterministic route id for one forwarded port of an environment.
pub fn route_id(environment: &str, container_port: u16) -> String {
    format!("branchbox-{environment}-{container_port}")
}

/// Idempotent route management on top of [`ProxyAdmin`]'s raw primitives.
///
/// All routes live in one shared collection on the proxy, so callers must
/// not run two synchronizations for the same proxy concurrently from one
/// operation; the environment-level helpers walk mappings one at a time.
pub struct RouteSynchronizer {
    admin: Arc<dyn ProxyAdmin>,
    upstream_host: String,
}

impl RouteSynchronizer {
    pub fn new(admin: Arc<dyn ProxyAdmin>, upstream_host: impl Into<String>) -> Self {
        Self {
            admin,
            upstream_host: upstream_host.into(),
        }
    }

    /// Make sure the route collection exists. Losing a creation race to
    /// another writer counts as success.
    pub async fn ensure_collection(&self) -> Result<()> {
        match self.admin.get_collection().await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!("route collection missing, creating it");
                match self.admin.put_collection(&[]).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.is_already_exists() => Ok(()),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Set the route `id` to forward `hostname` to `host_port`.
    ///
    /// The per-id endpoint only updates objects that already exist, so an
    /// unknown id falls back to appending the route to the collection.
    pub async fn upsert_route(&self, id: &str, hostname: &str, host_port: u16) -> Result<()> {
        self.ensure_collection().await?;
        let route = Route::reverse_proxy(id, hostname, &self.upstream_host, host_port);
        match self.admin.put_route(id, &route).await {
            Ok(()) => {
                debug!(route = %id, "route updated");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                self.admin.post_route(&route).await?;
                debug!(route = %id, "route added");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Delete the route `id`; an already absent route is fine.
    pub async fn remove_route(&self, id: &str) -> Result<()> {
        match self.admin.delete_route(id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(route = %id, "route already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Upsert the routes of every mapping of `environment`, in order.
    pub async fn sync_environment(&self, environment: &str, mappings: &[PortMapping]) -> Result<()> {
        for mapping in mappings {
            let id = route_id(environment, mapping.container_port);
            self.upsert_route(&id, &mapping.hostname, mapping.host_port)
                .await?;
        }
        info!(env = %environment, routes = mappings.len(), "routes synchronized");
        Ok(())
    }

    /// Remove the routes of every mapping of `environment`, in order.
    pub async fn remove_environment(&self, environment: &str, mappings: &[PortMapping]) -> Result<()> {
        for mapping in mappings {
            self.remove_route(&route_id(environment, mapping.container_port))
                .await?;
        }
        info!(env = %environment, routes = mappings.len(), "routes removed");
        Ok(())
    }
}
