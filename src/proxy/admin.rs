use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use serde_json::Value;
use std::time::Duration;

use super::Route;
use crate::error::{Error, Result};

/// Raw primitives of the reverse-proxy admin API.
///
/// None of these is idempotent on its own: `put_collection` fails when the
/// collection exists, `put_route` fails when the id is unknown and
/// `post_route` appends unconditionally. A missing object is reported as
/// [`Error::NotFound`], an existing one (HTTP 409) as an
/// [`Error::ExternalService`] for which `is_already_exists()` holds.
#[async_trait]
pub trait ProxyAdmin: Send + Sync {
    /// The route collection of our server.
    async fn get_collection(&self) -> Result<Vec<Value>>;
    /// Create the route collection with the given content.
    async fn put_collection(&self, routes: &[Route]) -> Result<()>;
    /// Replace the existing object registered under `id`.
    async fn put_route(&self, id: &str, route: &Route) -> Result<()>;
    /// Append a route to the collection.
    async fn post_route(&self, route: &Route) -> Result<()>;
    async fn delete_route(&self, id: &str) -> Result<()>;
}

/// [`ProxyAdmin`] for the Caddy admin API.
pub struct CaddyAdmin {
    client: reqwest::Client,
    base_url: String,
    server: String,
}

impl CaddyAdmin {
    pub fn new(base_url: &str, server: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            server: server.to_string(),
        }
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/config/apps/http/servers/{}/routes",
            self.base_url, self.server
        )
    }

    fn id_url(&self, id: &str) -> String {
        format!("{}/id/{}", self.base_url, id)
    }

    /// Wait for the admin endpoint to answer, polling with exponential
    /// backoff. Gives up after `timeout`.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let url = format!("{}/config/", self.base_url);
        let result = tokio::time::timeout(timeout, async {
            (|| async {
                let response = self.client.get(&url).send().await.map_err(transport_error)?;
                if !response.status().is_success() {
                    return Err(Error::external(
                        "caddy",
                        Some(response.status().as_u16()),
                        "admin API not ready",
                    ));
                }
                Ok(())
            })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(250))
                    .with_max_delay(Duration::from_secs(3))
                    .without_max_times(),
            )
            .await
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(Error::external(
                "caddy",
                None,
                format!("admin API at {} did not become ready within {:?}", self.base_url, timeout),
            )),
        }
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    Error::external("caddy", None, err.to_string())
}

/// Turn a non-2xx response into the matching error.
async fn check(response: reqwest::Response, kind: &'static str, name: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::not_found(kind, name));
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::external("caddy", Some(status.as_u16()), body.trim()))
}

#[async_trait]
impl ProxyAdmin for CaddyAdmin {
    async fn get_collection(&self) -> Result<Vec<Value>> {
        let response = self
            .client
            .get(self.collection_url())
            .send()
            .await
            .map_err(transport_error)?;
        let response = check(response, "route collection", &self.server).await?;
        // Caddy answers `null` for a config path that holds nothing.
        match response.json::<Value>().await.map_err(transport_error)? {
            Value::Null => Err(Error::not_found("route collection", &self.server)),
            Value::Array(routes) => Ok(routes),
            other => Err(Error::external(
                "caddy",
                None,
                format!("route collection is not an array: {other}"),
            )),
        }
    }

    async fn put_collection(&self, routes: &[Route]) -> Result<()> {
        let response = self
            .client
            .put(self.collection_url())
            .json(routes)
            .send()
            .await
            .map_err(transport_error)?;
        check(response, "route collection", &self.server).await?;
        Ok(())
    }

    async fn put_route(&self, id: &str, route: &Route) -> Result<()> {
        let response = self
            .client
            .put(self.id_url(id))
            .json(route)
            .send()
            .await
            .map_err(transport_error)?;
        check(response, "route", id).await?;
        Ok(())
    }

    async fn post_route(&self, route: &Route) -> Result<()> {
        let response = self
            .client
            .post(self.collection_url())
            .json(route)
            .send()
            .await
            .map_err(transport_error)?;
        check(response, "route collection", &self.server).await?;
        Ok(())
    }

    async fn delete_route(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.id_url(id))
            .send()
            .await
            .map_err(transport_error)?;
        check(response, "route", id).await?;
        Ok(())
    }
}
