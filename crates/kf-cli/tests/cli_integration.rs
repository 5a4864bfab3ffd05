//! CLI integration tests
//!
//! Tests the k-forward CLI using assert_cmd.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn k_forward() -> Command {
    Command::cargo_bin("k-forward")
        .expect("Failed to locate k-forward binary - ensure it's built before running tests")
}

/// Write a settings file pointing at `forwards.toml` next to it
fn settings_in(dir: &Path) -> PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, "profiles_path = \"forwards.toml\"\n").unwrap();
    path
}

const PROFILES: &str = r#"
[[forwards]]
name = "api"
resource = "svc/api"
localPort = 8080
remotePort = 80
autoStart = true

[[forwards]]
resource = "pod/web-0"
context = "staging"
namespace = "web"
localPort = 3000
remotePort = 3000
localAddress = "0.0.0.0"

[[forwards]]
name = "broken"
localPort = 1
remotePort = 1
"#;

#[test]
fn test_cli_help() {
    k_forward()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("k-forward"))
        .stdout(predicate::str::contains("Keeps kubectl port-forwards running"));
}

#[test]
fn test_cli_version() {
    k_forward()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("k-forward"));
}

#[test]
fn test_cli_run_help() {
    k_forward()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-console"))
        .stdout(predicate::str::contains("--kubectl"));
}

#[test]
fn test_cli_config_help() {
    k_forward()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_cli_invalid_command() {
    k_forward().arg("launch").assert().failure();
}

#[test]
fn test_check_lists_valid_profiles_and_skips_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings_in(dir.path());
    std::fs::write(dir.path().join("forwards.toml"), PROFILES).unwrap();

    k_forward()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "kubectl -n default port-forward svc/api 8080:80",
        ))
        .stdout(predicate::str::contains(
            "--context staging -n web port-forward pod/web-0 3000:3000 --address 0.0.0.0",
        ))
        .stdout(predicate::str::contains("2 profile(s) valid, 1 skipped"))
        .stderr(predicate::str::contains("resource is required"));
}

#[test]
fn test_check_json() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings_in(dir.path());
    let profiles = dir.path().join("team.json");
    std::fs::write(
        &profiles,
        r#"{"forwards": [{"name": "db", "resource": "svc/db", "localPort": "5432", "remotePort": 5432}]}"#,
    )
    .unwrap();

    let output = k_forward()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .arg("--profiles")
        .arg(&profiles)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["profiles"][0]["name"], "db");
    assert_eq!(report["profiles"][0]["localPort"], 5432);
    assert_eq!(report["rejected"].as_array().unwrap().len(), 0);
}

#[test]
fn test_check_missing_profiles_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings_in(dir.path());

    k_forward()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load profiles"));
}

#[test]
fn test_check_malformed_profiles_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings_in(dir.path());
    std::fs::write(dir.path().join("forwards.toml"), "forwards = \"nope\"").unwrap();

    k_forward()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .assert()
        .failure();
}

#[test]
fn test_explicit_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();

    k_forward()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load settings"));
}

#[test]
fn test_config_init_then_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("k-forward").join("config.toml");

    k_forward()
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created settings file"))
        .stdout(predicate::str::contains("Created profiles file"));

    assert!(config.exists());
    assert!(dir.path().join("k-forward").join("forwards.toml").exists());

    k_forward()
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Settings file already exists"));

    k_forward()
        .arg("--config")
        .arg(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("forwards.toml"));

    k_forward()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("name:api"));
}

#[test]
fn test_config_show_without_file_prints_defaults() {
    let dir = tempfile::tempdir().unwrap();

    k_forward()
        .arg("--config")
        .arg(dir.path().join("config.toml"))
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kubectl_path"))
        .stdout(predicate::str::contains("initial_ms = 1000"));
}
