//! CLI tests for the plughost binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn plughost() -> Command {
    let mut cmd = Command::cargo_bin("plughost").unwrap();
    cmd.env_remove("PLUGHOST_PLUGIN_DIR")
        .env_remove("PLUGHOST_STORAGE_DIR")
        .env_remove("PLUGHOST_ALLOW")
        .env_remove("PLUGHOST_LOG_JSON")
        .env_remove("RUST_LOG");
    cmd
}

fn library_name(stem: &str) -> String {
    format!("{}.{}", stem, std::env::consts::DLL_EXTENSION)
}

/// Test that the CLI binary exists and shows help.
#[test]
fn test_cli_help() {
    plughost()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("load"))
        .stdout(predicate::str::contains("command"))
        .stdout(predicate::str::contains("notify"))
        .stdout(predicate::str::contains("action"));
}

#[test]
fn test_cli_version() {
    plughost()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("plughost"));
}

#[test]
fn test_no_subcommand_shows_error() {
    plughost().assert().failure().code(2);
}

#[test]
fn test_load_missing_directory() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nowhere");

    plughost()
        .arg("--dir")
        .arg(&missing)
        .arg("load")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded: (none)"))
        .stdout(predicate::str::contains("Failed: directory does not exist"))
        .stdout(predicate::str::contains("Not allowed: (none)"));

    // no storage directory is created for a missing plugin directory
    assert!(!missing.exists());
}

#[test]
fn test_load_empty_directory_creates_storage() {
    let temp = TempDir::new().unwrap();

    plughost()
        .arg("--dir")
        .arg(temp.path())
        .arg("load")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded: (none)"))
        .stdout(predicate::str::contains("Failed: (none)"));

    assert!(temp.path().join("data").is_dir());
}

#[test]
fn test_load_ignores_invalid_libraries() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(library_name("broken")), b"not a library").unwrap();
    fs::write(temp.path().join("notes.txt"), b"hello").unwrap();

    plughost()
        .arg("--dir")
        .arg(temp.path())
        .arg("load")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded: (none)"))
        .stdout(predicate::str::contains("Failed: (none)"))
        .stdout(predicate::str::contains("broken").not());
}

#[test]
fn test_load_json_output() {
    let temp = TempDir::new().unwrap();

    let output = plughost()
        .arg("--dir")
        .arg(temp.path())
        .arg("load")
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["report"]["loaded"], serde_json::json!([]));
    assert_eq!(value["modules"], serde_json::json!([]));
}

#[test]
fn test_command_unknown_target() {
    let temp = TempDir::new().unwrap();

    plughost()
        .arg("--dir")
        .arg(temp.path())
        .args(["command", "EDSM", "status", "now"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FAILED EDSM: cannot find module"));
}

#[test]
fn test_command_all_without_plugins_prints_nothing() {
    let temp = TempDir::new().unwrap();

    plughost()
        .arg("--dir")
        .arg(temp.path())
        .args(["command", "all", "status"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_action_unknown_target() {
    let temp = TempDir::new().unwrap();

    plughost()
        .arg("--dir")
        .arg(temp.path())
        .args(["action", "EDSM", r#"{"event":"Docked"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("found: false, handled: false"));
}

#[test]
fn test_action_rejects_bad_json() {
    let temp = TempDir::new().unwrap();

    plughost()
        .arg("--dir")
        .arg(temp.path())
        .args(["action", "All", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid journal entry"));
}

#[test]
fn test_notify_counts_valid_lines() {
    let temp = TempDir::new().unwrap();
    let journal = temp.path().join("Journal.log");
    fs::write(
        &journal,
        "{\"event\":\"Fileheader\"}\n\n{broken\n{\"event\":\"FSDJump\"}\n",
    )
    .unwrap();

    plughost()
        .arg("--dir")
        .arg(temp.path())
        .arg("notify")
        .arg(&journal)
        .arg("--refresh")
        .args(["--commander", "Jameson"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sent 2 entries to 0 plugins"));
}

#[test]
fn test_notify_missing_file() {
    let temp = TempDir::new().unwrap();

    plughost()
        .arg("--dir")
        .arg(temp.path())
        .arg("notify")
        .arg(temp.path().join("missing.log"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read journal"));
}

#[test]
fn test_config_file_sets_plugin_dir() {
    let temp = TempDir::new().unwrap();
    let plugins = temp.path().join("plugins");
    let storage = temp.path().join("store");
    fs::create_dir(&plugins).unwrap();

    let config = temp.path().join("plughost.toml");
    fs::write(
        &config,
        format!(
            "plugin_dir = {:?}\nstorage_dir = {:?}\nallow = \"EDSM,Inara\"\n",
            plugins.display().to_string(),
            storage.display().to_string()
        ),
    )
    .unwrap();

    plughost()
        .arg("--config")
        .arg(&config)
        .arg("load")
        .assert()
        .success()
        .stdout(predicate::str::contains("Failed: (none)"));

    assert!(storage.is_dir());
}

#[test]
fn test_config_file_invalid() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("plughost.toml");
    fs::write(&config, "plugin_dir = [").unwrap();

    plughost()
        .arg("--config")
        .arg(&config)
        .arg("load")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config"));
}
