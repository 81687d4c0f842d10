use crate::common::*;
use predicates::prelude::*;

#[test]
fn help_lists_lifecycle_commands() {
    branchbox()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("branch"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn list_with_no_environments() {
    let home = TestHome::new();
    branchbox()
        .args(["-c", home.config_path.to_str().unwrap(), "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No environments found."));
    assert!(home.database_path().is_file(), "state database created on first use");
}

#[test]
fn list_json_prints_empty_array() {
    let home = TestHome::new();
    let output = branchbox()
        .args(["-c", home.config_path.to_str().unwrap(), "list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed, serde_json::json!([]));
}

#[test]
fn config_can_come_from_environment_variable() {
    let home = TestHome::new();
    branchbox()
        .env("BRANCHBOX_CONFIG", &home.config_path)
        .args(["list", "--json"])
        .assert()
        .success();
    assert!(home.database_path().is_file());
}

#[test]
fn missing_config_file_is_an_error() {
    let home = TestHome::new();
    let missing = home.dir.path().join("nope.toml");
    branchbox()
        .args(["-c", missing.to_str().unwrap(), "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn create_outside_a_repository_fails() {
    let home = TestHome::new();
    let not_a_repo = home.dir.path().join("plain");
    std::fs::create_dir_all(&not_a_repo).unwrap();

    branchbox()
        .args([
            "-c",
            home.config_path.to_str().unwrap(),
            "create",
            "--repo",
            not_a_repo.to_str().unwrap(),
            "main",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("git"));
}
