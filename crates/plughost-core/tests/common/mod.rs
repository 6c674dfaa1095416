//! Shared fixtures for plugin manager tests.
//!
//! Plugins are `extern "C"` functions in this test binary. `TableOpener`
//! serves them for files whose stem is registered and rejects every other
//! file, the way the platform loader rejects a non-library.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::c_char;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use plughost_core::abi::HostCallbacks;
use plughost_core::{EntryPoints, ModuleOpener, OpenedModule, PluginError, Result};

#[derive(Default)]
pub struct TableOpener {
    tables: HashMap<String, EntryPoints>,
}

impl TableOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stem: &str, entry_points: EntryPoints) -> Self {
        self.tables.insert(stem.to_string(), entry_points);
        self
    }
}

impl ModuleOpener for TableOpener {
    fn open(&self, path: &Path) -> Result<OpenedModule> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        self.tables
            .get(stem)
            .copied()
            .map(OpenedModule::in_process)
            .ok_or_else(|| PluginError::LoadFailed(format!("not a library: {}", path.display())))
    }
}

/// File name with the platform library extension.
pub fn module_file(stem: &str) -> String {
    format!("{}.{}", stem, std::env::consts::DLL_EXTENSION)
}

/// Create `<dir>/<stem>.<ext>` with a modification time `age_secs` after the
/// epoch, so tests control discovery order.
pub fn touch_module(dir: &Path, stem: &str, age_secs: u64) -> PathBuf {
    let path = dir.join(module_file(stem));
    let file = File::create(&path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(age_secs))
        .unwrap();
    path
}

pub unsafe extern "C" fn init_ok(
    _host_version: *const c_char,
    _plugin_dir: *const c_char,
    _callbacks: *const HostCallbacks,
) -> *const c_char {
    c"1.0.0".as_ptr()
}

pub unsafe extern "C" fn init_refuse(
    _host_version: *const c_char,
    _plugin_dir: *const c_char,
    _callbacks: *const HostCallbacks,
) -> *const c_char {
    c"!needs newer host".as_ptr()
}

pub unsafe extern "C" fn init_null(
    _host_version: *const c_char,
    _plugin_dir: *const c_char,
    _callbacks: *const HostCallbacks,
) -> *const c_char {
    std::ptr::null()
}

pub unsafe extern "C" fn command_ok(
    _cmd: *const c_char,
    _argv: *const *const c_char,
    _argc: usize,
) -> *const c_char {
    c"+OK".as_ptr()
}

pub unsafe extern "C" fn command_bad_arg(
    _cmd: *const c_char,
    _argv: *const *const c_char,
    _argc: usize,
) -> *const c_char {
    c"-bad arg".as_ptr()
}

pub unsafe extern "C" fn command_null(
    _cmd: *const c_char,
    _argv: *const *const c_char,
    _argc: usize,
) -> *const c_char {
    std::ptr::null()
}

pub unsafe extern "C" fn action_yes(_entry: *const c_char) -> bool {
    true
}

pub unsafe extern "C" fn action_no(_entry: *const c_char) -> bool {
    false
}

pub fn plain() -> EntryPoints {
    EntryPoints::new(init_ok)
}
