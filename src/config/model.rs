use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BranchboxConfig {
    /// Directory holding the state database. Defaults to the platform's
    /// local data directory.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub ports: PortsConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub worktrees: WorktreesConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

fn default_range_start() -> u16 {
    49200
}

fn default_container_port() -> u16 {
    3000
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PortsConfig {
    /// First host port handed out when no mappings exist yet.
    #[serde(default = "default_range_start")]
    pub range_start: u16,
    /// Container port whose hostname carries no `--<port>` suffix.
    #[serde(default = "default_container_port")]
    pub default_container_port: u16,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            range_start: default_range_start(),
            default_container_port: default_container_port(),
        }
    }
}

fn default_admin_url() -> String {
    "http://localhost:2019".to_string()
}

fn default_server() -> String {
    "branchbox".to_string()
}

fn default_upstream_host() -> String {
    "host.docker.internal".to_string()
}

fn default_domain() -> String {
    "localhost".to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProxyConfig {
    /// Base URL of the Caddy admin API.
    #[serde(default = "default_admin_url")]
    pub admin_url: String,
    /// Name of the HTTP server whose route list holds our routes.
    #[serde(default = "default_server")]
    pub server: String,
    /// Host the proxy dials to reach published container ports.
    #[serde(default = "default_upstream_host")]
    pub upstream_host: String,
    #[serde(default = "default_domain")]
    pub domain: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            admin_url: default_admin_url(),
            server: default_server(),
            upstream_host: default_upstream_host(),
            domain: default_domain(),
        }
    }
}

fn default_image() -> String {
    "mcr.microsoft.com/devcontainers/base:ubuntu".to_string()
}

fn default_stop_timeout() -> i32 {
    10
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DockerConfig {
    /// Image used when a worktree has no devcontainer descriptor.
    #[serde(default = "default_image")]
    pub default_image: String,
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: i32,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            default_image: default_image(),
            stop_timeout_secs: default_stop_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct WorktreesConfig {
    /// Where per-environment worktrees are checked out. Defaults to
    /// `<state_dir>/worktrees`.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

fn default_api_port() -> u16 {
    7420
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

impl BranchboxConfig {
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("branchbox")
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.state_dir().join("branchbox.db")
    }

    pub fn worktrees_root(&self) -> PathBuf {
        self.worktrees
            .root
            .clone()
            .unwrap_or_else(|| self.state_dir().join("worktrees"))
    }
}
