//! Builds a [`RuntimeConfig`] from a worktree's devcontainer descriptor.
//!
//! This is a pure data transformation: no lifecycle state, no gateway calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Descriptor locations, in lookup order.
const DESCRIPTOR_PATHS: &[&str] = &[".devcontainer/devcontainer.json", ".devcontainer.json"];

/// Everything needed to (re)build an environment's container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub image: String,
    pub forward_ports: Vec<u16>,
    #[serde(default)]
    pub container_env: BTreeMap<String, String>,
    pub workspace_folder: String,
}

/// Fallbacks applied when the descriptor is absent or leaves a field unset.
#[derive(Debug, Clone)]
pub struct RuntimeDefaults {
    pub image: String,
    pub container_port: u16,
}

/// Read the devcontainer descriptor in `worktree` (if any) and merge it over
/// `defaults`.
pub fn load_runtime_config(worktree: &Path, defaults: &RuntimeDefaults) -> Result<RuntimeConfig> {
    let workspace_name = worktree
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "workspace".to_string());

    for rel in DESCRIPTOR_PATHS {
        let path = worktree.join(rel);
        if path.is_file() {
            tracing::debug!(path = %path.display(), "reading devcontainer descriptor");
            let content = std::fs::read_to_string(&path)?;
            let descriptor: Value = serde_json::from_str(&strip_jsonc(&content))?;
            return merge(Some(&descriptor), defaults, &workspace_name);
        }
    }

    merge(None, defaults, &workspace_name)
}

/// Merge a parsed descriptor over the defaults.
///
/// `forwardPorts` accepts numbers, numeric strings and `"host:port"` strings
/// (only the port is kept). `remoteEnv` entries override `containerEnv`.
pub fn merge(
    descriptor: Option<&Value>,
    defaults: &RuntimeDefaults,
    workspace_name: &str,
) -> Result<RuntimeConfig> {
    let empty = Value::Object(Default::default());
    let d = descriptor.unwrap_or(&empty);
    if !d.is_object() {
        return Err(Error::Validation(
            "devcontainer descriptor must be a JSON object".to_string(),
        ));
    }

    let image = d
        .get("image")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| defaults.image.clone());

    let mut forward_ports = Vec::new();
    if let Some(ports) = d.get("forwardPorts").and_then(Value::as_array) {
        for port in ports {
            let parsed = match port {
                Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
                Value::String(s) => s.rsplit(':').next().and_then(|p| p.parse::<u16>().ok()),
                _ => None,
            };
            match parsed {
                Some(p) if p != 0 => {
                    if !forward_ports.contains(&p) {
                        forward_ports.push(p);
                    }
                }
                _ => {
                    return Err(Error::Validation(format!(
                        "invalid forwardPorts entry in devcontainer descriptor: {port}"
                    )))
                }
            }
        }
    }
    if forward_ports.is_empty() {
        forward_ports.push(defaults.container_port);
    }

    let mut container_env = BTreeMap::new();
    for key in ["containerEnv", "remoteEnv"] {
        if let Some(env) = d.get(key).and_then(Value::as_object) {
            for (k, v) in env {
                let value = match v {
                    Value::String(s) => s.clone(),
                    Value::Null => continue,
                    other => other.to_string(),
                };
                container_env.insert(k.clone(), value);
            }
        }
    }

    let workspace_folder = d
        .get("workspaceFolder")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("/workspaces/{workspace_name}"));

    Ok(RuntimeConfig {
        image,
        forward_ports,
        container_env,
        workspace_folder,
    })
}

/// Drop `//` and `/* */` comments and trailing commas so that a JSONC
/// descriptor parses as plain JSON. String literals are left untouched.
fn strip_jsonc(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    let mut in_string = false;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i += 2;
            }
            ',' => {
                // Trailing comma: next significant char closes the container.
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}
