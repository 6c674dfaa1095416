//! Plugin manager: discovery, allow-list, initialization and dispatch.
//!
//! ```text
//!  load(dir) ──► candidates (oldest first)
//!                   │
//!                   ▼
//!            ModuleHandle::load_with ──✗──► skipped silently
//!                   │
//!            AllowPolicy::allows ─────✗──► not_allowed
//!                   │
//!            ModuleHandle::init ──────✗──► failed ("name: detail")
//!                   │
//!                   ▼
//!               modules  ──► refresh / new_journal_entry
//!                        ──► action_journal_entry / action_command
//! ```
//!
//! The manager never returns an error: every per-module outcome is folded
//! into [`LoadReport`], [`JournalOutcome`] or [`CommandResult`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::abi::HostCallbacks;
use crate::journal::JournalEntry;
use crate::module::{ModuleHandle, ModuleInfo, ModuleOpener, NativeOpener};
use crate::policy::{same_name, AllowPolicy, Target};

/// `failed` entry when the plugin directory is missing.
pub const DIRECTORY_MISSING: &str = "directory does not exist";

/// Message of the synthetic result for an unknown target module.
pub const CANNOT_FIND_MODULE: &str = "cannot find module";

/// Message for a module without a command entry point.
pub const COMMAND_NOT_IMPLEMENTED: &str = "module does not implement command execution";

/// Outcome of [`PluginManager::load`], in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<String>,
    pub not_allowed: Vec<String>,
}

impl LoadReport {
    pub fn loaded_list(&self) -> String {
        self.loaded.join(",")
    }

    pub fn failed_list(&self) -> String {
        self.failed.join(",")
    }

    pub fn not_allowed_list(&self) -> String {
        self.not_allowed.join(",")
    }
}

/// Outcome of a journal action: whether the target exists and whether it
/// acted on the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JournalOutcome {
    pub found: bool,
    pub handled: bool,
}

/// Per-module result of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub ok: bool,
    pub module: String,
    pub message: String,
}

impl CommandResult {
    pub fn failure(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            module: module.into(),
            message: message.into(),
        }
    }
}

/// Owns the loaded plugin modules.
pub struct PluginManager {
    modules: Vec<ModuleHandle>,
    /// Tables handed to plugins; boxed so their address survives until unload.
    callback_tables: Vec<Box<HostCallbacks>>,
    opener: Box<dyn ModuleOpener>,
}

impl PluginManager {
    /// Manager using the platform dynamic loader.
    pub fn new() -> Self {
        Self::with_opener(NativeOpener)
    }

    pub fn with_opener(opener: impl ModuleOpener + 'static) -> Self {
        Self {
            modules: Vec::new(),
            callback_tables: Vec::new(),
            opener: Box::new(opener),
        }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn modules(&self) -> &[ModuleHandle] {
        &self.modules
    }

    pub fn module_infos(&self) -> Vec<ModuleInfo> {
        self.modules.iter().map(ModuleHandle::info).collect()
    }

    /// Discover, filter and initialize the modules in `directory`.
    ///
    /// Appends to the existing collection; names already loaded are skipped.
    pub fn load(
        &mut self,
        directory: impl AsRef<Path>,
        host_version: &str,
        plugin_dir: impl AsRef<Path>,
        callbacks: &HostCallbacks,
        policy: &AllowPolicy,
    ) -> LoadReport {
        let directory = directory.as_ref();
        let plugin_dir = plugin_dir.as_ref();
        let mut report = LoadReport::default();

        if !directory.is_dir() {
            warn!("Plugin directory {} does not exist", directory.display());
            report.failed.push(DIRECTORY_MISSING.to_string());
            return report;
        }

        let table = Box::new(*callbacks);

        for path in candidates(directory) {
            let mut handle = ModuleHandle::new();
            if let Err(e) = handle.load_with(&path, self.opener.as_ref()) {
                debug!("Skipping {}: {}", path.display(), e);
                continue;
            }

            let name = handle.name().to_string();
            if self.find_by_name(&name).is_some() {
                warn!(module = %name, "Module already loaded, ignoring {}", path.display());
                continue;
            }

            if !policy.allows(&name) {
                info!(module = %name, "Module not in allow list");
                report.not_allowed.push(name);
                continue;
            }

            match handle.init(host_version, plugin_dir, &table) {
                Ok(()) => {
                    info!(module = %name, version = %handle.version_info(), "Loaded plugin");
                    report.loaded.push(name);
                    self.modules.push(handle);
                }
                Err(e) => {
                    warn!(module = %name, "{}", e);
                    report.failed.push(match handle.init_diagnostic() {
                        Some(detail) => format!("{}: {}", name, detail),
                        None => name,
                    });
                }
            }
        }

        if !report.loaded.is_empty() {
            self.callback_tables.push(table);
        }

        report
    }

    /// Terminate and release every module, then clear the collection.
    pub fn unload(&mut self) {
        for module in &mut self.modules {
            module.unload();
        }
        self.modules.clear();
        self.callback_tables.clear();
    }

    pub fn refresh(&self, commander: &str, entry: &JournalEntry) {
        for module in &self.modules {
            module.refresh(commander, entry);
        }
    }

    pub fn new_journal_entry(&self, entry: &JournalEntry) {
        for module in &self.modules {
            module.new_journal_entry(entry);
        }
    }

    /// Case-insensitive lookup.
    pub fn find_by_name(&self, name: &str) -> Option<&ModuleHandle> {
        self.modules
            .iter()
            .find(|module| same_name(module.name(), name))
    }

    pub fn action_journal_entry(&self, target: &Target, entry: &JournalEntry) -> JournalOutcome {
        match target {
            Target::All => self.broadcast_journal_entry(entry),
            Target::Module(name) => self.action_journal_entry_for(name, entry),
        }
    }

    /// Offer `entry` to every module. Always reports found and handled.
    pub fn broadcast_journal_entry(&self, entry: &JournalEntry) -> JournalOutcome {
        for module in &self.modules {
            module.action_journal_entry(entry);
        }

        JournalOutcome {
            found: true,
            handled: true,
        }
    }

    pub fn action_journal_entry_for(&self, name: &str, entry: &JournalEntry) -> JournalOutcome {
        match self.find_by_name(name) {
            Some(module) => JournalOutcome {
                found: true,
                handled: module.action_journal_entry(entry),
            },
            None => JournalOutcome {
                found: false,
                handled: false,
            },
        }
    }

    pub fn action_command(&self, target: &Target, cmd: &str, args: &[&str]) -> Vec<CommandResult> {
        match target {
            Target::All => self.broadcast_command(cmd, args),
            Target::Module(name) => vec![self.command_module(name, cmd, args)],
        }
    }

    /// One result per module, in load order.
    pub fn broadcast_command(&self, cmd: &str, args: &[&str]) -> Vec<CommandResult> {
        self.modules
            .iter()
            .map(|module| run_command(module, cmd, args))
            .collect()
    }

    pub fn command_module(&self, name: &str, cmd: &str, args: &[&str]) -> CommandResult {
        match self.find_by_name(name) {
            Some(module) => run_command(module, cmd, args),
            None => CommandResult::failure(name, CANNOT_FIND_MODULE),
        }
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        self.unload();
    }
}

fn run_command(module: &ModuleHandle, cmd: &str, args: &[&str]) -> CommandResult {
    match module.action_command(cmd, args) {
        Some(reply) => CommandResult {
            ok: reply.ok,
            module: module.name().to_string(),
            message: reply.message,
        },
        None => CommandResult::failure(module.name(), COMMAND_NOT_IMPLEMENTED),
    }
}

/// Check if a file has the platform's dynamic library extension.
pub fn is_module_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(std::env::consts::DLL_EXTENSION))
        .unwrap_or(false)
}

/// Top-level module files in `directory`, oldest modification time first.
///
/// Ties are broken by path so the order is reproducible.
pub fn candidates(directory: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read plugin directory {}: {}", directory.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<(SystemTime, PathBuf)> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_module_file(path))
        .map(|path| {
            // unknown times sort first
            let modified = match fs::metadata(&path).and_then(|meta| meta.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("No modification time for {}: {}", path.display(), e);
                    SystemTime::UNIX_EPOCH
                }
            };
            (modified, path)
        })
        .collect();

    files.sort();
    files.into_iter().map(|(_, path)| path).collect()
}
