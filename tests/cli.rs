//! Binary-level tests for commands that never reach the container engine.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn resen(config: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("resen").unwrap();
    cmd.env("RESEN_CONFIG_DIR", config.path()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_create_then_list() {
    let config = TempDir::new().unwrap();
    resen(&config)
        .args(["create", "lab"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created bucket 'lab'"));

    resen(&config)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bucket Name"))
        .stdout(predicate::str::contains("lab"))
        .stdout(predicate::str::contains("unset"));

    assert!(config.path().join("buckets.json").is_file());
    assert!(!config.path().join("lock").exists());
}

#[test]
fn test_create_duplicate_fails() {
    let config = TempDir::new().unwrap();
    resen(&config).args(["create", "lab"]).assert().success();
    resen(&config)
        .args(["create", "lab"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("lab"));
}

#[test]
fn test_list_names_as_json() {
    let config = TempDir::new().unwrap();
    resen(&config).args(["create", "alpha"]).assert().success();
    resen(&config).args(["create", "beta"]).assert().success();

    let output = resen(&config).args(["list", "--names", "--json"]).output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["buckets"], serde_json::json!(["alpha", "beta"]));
}

#[test]
fn test_remove_fresh_bucket() {
    let config = TempDir::new().unwrap();
    resen(&config).args(["create", "lab"]).assert().success();
    resen(&config)
        .args(["remove", "lab"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed bucket 'lab'"));
    resen(&config)
        .args(["list", "lab"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_add_storage_validation() {
    let config = TempDir::new().unwrap();
    let host = TempDir::new().unwrap();
    let local = host.path().to_str().unwrap();
    resen(&config).args(["create", "lab"]).assert().success();

    resen(&config)
        .args(["add-storage", "lab", local, "/etc/data", "rw"])
        .assert()
        .failure();
    resen(&config)
        .args(["add-storage", "lab", local, "/home/jovyan/mount/data", "x"])
        .assert()
        .failure();
    resen(&config)
        .args(["add-storage", "lab", "/definitely/not/here", "/home/jovyan/mount/data"])
        .assert()
        .failure();
    resen(&config)
        .args(["add-storage", "lab", local, "/home/jovyan/mount/data", "rw"])
        .assert()
        .success();

    let registry = fs::read_to_string(config.path().join("buckets.json")).unwrap();
    assert!(registry.contains("/home/jovyan/mount/data"));
}

#[test]
fn test_add_and_remove_port() {
    let config = TempDir::new().unwrap();
    resen(&config).args(["create", "lab"]).assert().success();
    resen(&config)
        .args(["add-port", "lab", "8000", "8888"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bound local port 8000 to container port 8888/tcp"));
    resen(&config).args(["add-port", "lab", "8000", "9999"]).assert().failure();
    resen(&config).args(["remove-port", "lab", "8000"]).assert().success();
    resen(&config).args(["remove-port", "lab", "8000"]).assert().failure();
}

#[test]
fn test_set_image() {
    let config = TempDir::new().unwrap();
    resen(&config).args(["create", "lab"]).assert().success();
    resen(&config).args(["set-image", "lab", "0.0.1"]).assert().failure();
    resen(&config).args(["set-image", "lab", "2019.1.0rc2"]).assert().success();
    resen(&config)
        .args(["set-image", "lab", "2019.1.0rc2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already"));
    resen(&config)
        .args(["list", "lab"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2019.1.0rc2"));
}

#[test]
fn test_images_listing() {
    let config = TempDir::new().unwrap();
    resen(&config)
        .arg("images")
        .assert()
        .success()
        .stdout(predicate::str::contains("earthcubeingeo/resen-core"));
}

#[test]
fn test_held_lock_refuses_to_run() {
    let config = TempDir::new().unwrap();
    fs::write(config.path().join("lock"), format!("{}\n", std::process::id())).unwrap();
    resen(&config)
        .arg("list")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already running"));
    assert!(config.path().join("lock").exists());
}
