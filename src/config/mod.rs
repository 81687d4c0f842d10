pub mod model;
pub mod resolve;

use std::path::Path;

use model::BranchboxConfig;

pub fn load_config(path: &Path) -> anyhow::Result<BranchboxConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
    let config: BranchboxConfig = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e))?;
    Ok(config)
}

/// Load the resolved config file, or fall back to defaults when none exists.
pub fn load_or_default(cli_file: Option<&Path>) -> anyhow::Result<BranchboxConfig> {
    match resolve::resolve_config(cli_file)? {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            load_config(&path)
        }
        None => Ok(BranchboxConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_reports_parse_errors_with_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("branchbox.toml");
        std::fs::write(&path, "[ports\nrange_start = 1").unwrap();

        let err = load_config(&path).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config file"), "got: {err}");
        assert!(err.contains("branchbox.toml"), "got: {err}");
    }

    #[test]
    fn load_or_default_reads_explicit_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("branchbox.toml");
        std::fs::write(&path, "[api]\nport = 9000\n").unwrap();

        let config = load_or_default(Some(&path)).unwrap();
        assert_eq!(config.api.port, 9000);
    }
}
