//! Native Loading Tests
//!
//! Loads real dynamic libraries through the platform loader:
//! - A plugin built with `export_plugin!` (`tests/fixtures/echo-plugin`)
//! - A library without plugin entry points (`tests/fixtures/blank-library`)
//!
//! The fixtures are built on first use into their own target directory.

mod common;

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use common::module_file;
use plughost_core::{
    tracing_callbacks, AllowPolicy, Capabilities, CommandResult, JournalEntry, JournalOutcome,
    LoadState, ModuleHandle, PluginError, PluginManager, Target,
};
use serde_json::json;
use tempfile::TempDir;

/// Directory holding the built fixture libraries.
fn fixture_dir() -> &'static Path {
    static BUILT: OnceLock<PathBuf> = OnceLock::new();
    BUILT.get_or_init(|| {
        // <target>/<profile>/deps/<test binary>
        let exe = std::env::current_exe().unwrap();
        let profile_dir = exe.parent().and_then(Path::parent).unwrap();
        let release = profile_dir.file_name().is_some_and(|name| name == "release");
        let target_dir = profile_dir.parent().unwrap().join("plughost-fixtures");

        let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
        let mut build = Command::new(cargo);
        build
            .current_dir(env!("CARGO_MANIFEST_DIR"))
            .args(["build", "-p", "plughost-echo-plugin", "-p", "plughost-blank-library"])
            .arg("--target-dir")
            .arg(&target_dir);
        if release {
            build.arg("--release");
        }
        let status = build.status().unwrap();
        assert!(status.success(), "building fixture libraries failed");

        target_dir.join(if release { "release" } else { "debug" })
    })
}

fn fixture(lib_name: &str) -> PathBuf {
    fixture_dir().join(format!("{}{}{}", DLL_PREFIX, lib_name, DLL_SUFFIX))
}

#[test]
fn test_manager_drives_native_plugin() {
    let dir = TempDir::new().unwrap();
    fs::copy(fixture("plughost_echo_plugin"), dir.path().join(module_file("echo_a"))).unwrap();
    fs::copy(fixture("plughost_blank_library"), dir.path().join(module_file("blank"))).unwrap();
    fs::write(dir.path().join(module_file("junk")), b"not a library").unwrap();

    let mut manager = PluginManager::new();
    let report = manager.load(
        dir.path(),
        "4.0.0",
        dir.path().join("data"),
        &tracing_callbacks(),
        &AllowPolicy::All,
    );

    assert_eq!(report.loaded, vec!["echo_a"]);
    assert!(report.failed.is_empty());
    assert!(report.not_allowed.is_empty());
    for name in ["blank", "junk"] {
        assert!(manager.find_by_name(name).is_none());
    }

    let module = manager.find_by_name("Echo_A").unwrap();
    assert!(module.is_ready());
    assert_eq!(module.version_info(), env!("CARGO_PKG_VERSION"));
    assert_eq!(module.capabilities(), Capabilities::all());

    assert_eq!(
        manager.action_command(&Target::All, "echo", &["x", "y"]),
        vec![CommandResult {
            ok: true,
            module: "echo_a".to_string(),
            message: "x,y".to_string(),
        }]
    );
    assert_eq!(
        manager.action_command(&Target::parse("echo_a"), "host", &[]),
        vec![CommandResult {
            ok: true,
            module: "echo_a".to_string(),
            message: "4.0.0".to_string(),
        }]
    );
    assert_eq!(
        manager.action_command(&Target::parse("ECHO_A"), "fly", &[]),
        vec![CommandResult::failure("echo_a", "bad arg")]
    );

    let docked = JournalEntry::new(json!({"event": "Docked"}));
    assert_eq!(
        manager.action_journal_entry(&Target::parse("echo_a"), &docked),
        JournalOutcome {
            found: true,
            handled: true,
        }
    );

    manager.unload();
    manager.unload();
    assert!(manager.is_empty());
    assert!(manager.find_by_name("echo_a").is_none());
}

#[test]
fn test_library_without_initialise_is_rejected() {
    let path = fixture("plughost_blank_library");

    let mut handle = ModuleHandle::new();
    let err = handle.load(&path).unwrap_err();

    match err {
        PluginError::MissingEntryPoint { symbol, path: reported } => {
            assert_eq!(symbol, "plughost_initialise");
            assert_eq!(reported, path.display().to_string());
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(handle.state(), LoadState::NativeLoadFailed);
}

#[test]
fn test_native_handle_resolves_optional_entry_points() {
    let mut handle = ModuleHandle::new();
    handle.load(fixture("plughost_echo_plugin")).unwrap();
    assert_eq!(handle.state(), LoadState::Loaded);
    assert_eq!(handle.name(), format!("{}plughost_echo_plugin", DLL_PREFIX));
    assert!(handle.capabilities().contains(
        Capabilities::REFRESH | Capabilities::ACTION_COMMAND | Capabilities::TERMINATE
    ));

    handle.unload();
    assert_eq!(handle.state(), LoadState::Unloaded);
}
