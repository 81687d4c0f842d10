use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "branchbox.toml";

/// The per-user config file location, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("branchbox").join(CONFIG_FILE))
}

/// Resolve the config file path. An explicitly given file (flag or
/// `BRANCHBOX_CONFIG`) must exist. Otherwise the per-user config is used
/// when present, and `None` means "run on defaults".
pub fn resolve_config(cli_file: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = cli_file {
        if path.is_file() {
            return Ok(Some(path.canonicalize()?));
        }
        anyhow::bail!("Config file not found: {}", path.display());
    }

    Ok(user_config_path().filter(|p| p.is_file()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn explicit_file_is_canonicalized() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE);
        fs::write(&config_path, "").unwrap();

        let resolved = resolve_config(Some(&config_path)).unwrap();
        assert_eq!(resolved, Some(config_path.canonicalize().unwrap()));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.toml");

        let err = resolve_config(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
