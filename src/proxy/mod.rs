pub mod admin;
pub mod routes;

use serde::{Deserialize, Serialize};

pub use admin::{CaddyAdmin, ProxyAdmin};
pub use routes::{route_id, RouteSynchronizer};

/// A Caddy HTTP route forwarding one hostname to a published host port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "match")]
    pub matchers: Vec<HostMatch>,
    pub handle: Vec<Handler>,
    #[serde(default)]
    pub terminal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostMatch {
    pub host: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "handler", rename_all = "snake_case")]
pub enum Handler {
    ReverseProxy { upstreams: Vec<Upstream> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upstream {
    pub dial: String,
}

impl Route {
    pub fn reverse_proxy(id: &str, hostname: &str, upstream_host: &str, host_port: u16) -> Self {
        Self {
            id: id.to_string(),
            matchers: vec![HostMatch {
                host: vec![hostname.to_string()],
            }],
            handle: vec![Handler::ReverseProxy {
                upstreams: vec![Upstream {
                    dial: format!("{upstream_host}:{host_port}"),
                }],
            }],
            terminal: true,
        }
    }
}
