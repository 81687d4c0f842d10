#![allow(dead_code)]
use std::path::PathBuf;
use tempfile::TempDir;

/// A temporary state directory with a `branchbox.toml` pointing at it.
pub struct TestHome {
    pub dir: TempDir,
    pub config_path: PathBuf,
}

impl TestHome {
    pub fn new() -> Self {
        Self::with_config("")
    }

    pub fn with_config(extra_toml: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let state_dir = dir.path().join("state");
        let config_path = dir.path().join("branchbox.toml");
        std::fs::write(
            &config_path,
            format!(
                "state_dir = {:?}\n\n[proxy]\nadmin_url = \"http://127.0.0.1:9\"\n{extra_toml}",
                state_dir.to_string_lossy()
            ),
        )
        .unwrap();
        Self { dir, config_path }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn database_path(&self) -> PathBuf {
        self.state_dir().join("branchbox.db")
    }
}

pub fn branchbox() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("branchbox").unwrap();
    cmd.env_remove("BRANCHBOX_CONFIG").env("RUST_LOG", "warn");
    cmd
}
