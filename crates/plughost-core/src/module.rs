//! Handle for one native plugin module.
//!
//! A [`ModuleHandle`] owns the OS library handle and the resolved entry-point
//! table. Optional entry points are `Option` slots: an unbound slot is a legal
//! no-op, never an error.

use std::ffi::{c_char, CString};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use libloading::Library;
use tracing::{debug, warn};

use crate::abi::{
    self, symbols, ActionCommandFn, ActionJournalEntryFn, CommandReply, HostCallbacks,
    InitStatus, InitialiseFn, NewJournalEntryFn, RefreshFn, TerminateFn,
};
use crate::error::{PluginError, Result};
use crate::journal::JournalEntry;

/// Lifecycle of a module handle.
///
/// `Unloaded -> {NativeLoadFailed | Loaded} -> {InitFailed | Ready} -> Unloaded`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    NativeLoadFailed,
    Loaded,
    InitFailed,
    Ready,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadState::Unloaded => "Unloaded",
            LoadState::NativeLoadFailed => "NativeLoadFailed",
            LoadState::Loaded => "Loaded",
            LoadState::InitFailed => "InitFailed",
            LoadState::Ready => "Ready",
        };
        f.write_str(s)
    }
}

bitflags::bitflags! {
    /// Optional entry points a module exports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        const REFRESH = 1 << 0;
        const NEW_JOURNAL_ENTRY = 1 << 1;
        const ACTION_JOURNAL_ENTRY = 1 << 2;
        const ACTION_COMMAND = 1 << 3;
        const TERMINATE = 1 << 4;
    }
}

impl Capabilities {
    /// Lower-case names of the set flags, in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.iter_names()
            .map(|(name, _)| name.to_ascii_lowercase())
            .collect()
    }
}

/// Resolved entry points of one module.
#[derive(Clone, Copy)]
pub struct EntryPoints {
    pub initialise: InitialiseFn,
    pub refresh: Option<RefreshFn>,
    pub new_journal_entry: Option<NewJournalEntryFn>,
    pub action_journal_entry: Option<ActionJournalEntryFn>,
    pub action_command: Option<ActionCommandFn>,
    pub terminate: Option<TerminateFn>,
}

impl EntryPoints {
    /// Table with only the mandatory entry point bound.
    pub fn new(initialise: InitialiseFn) -> Self {
        Self {
            initialise,
            refresh: None,
            new_journal_entry: None,
            action_journal_entry: None,
            action_command: None,
            terminate: None,
        }
    }

    pub fn with_refresh(mut self, f: RefreshFn) -> Self {
        self.refresh = Some(f);
        self
    }

    pub fn with_new_journal_entry(mut self, f: NewJournalEntryFn) -> Self {
        self.new_journal_entry = Some(f);
        self
    }

    pub fn with_action_journal_entry(mut self, f: ActionJournalEntryFn) -> Self {
        self.action_journal_entry = Some(f);
        self
    }

    pub fn with_action_command(mut self, f: ActionCommandFn) -> Self {
        self.action_command = Some(f);
        self
    }

    pub fn with_terminate(mut self, f: TerminateFn) -> Self {
        self.terminate = Some(f);
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::empty();
        caps.set(Capabilities::REFRESH, self.refresh.is_some());
        caps.set(Capabilities::NEW_JOURNAL_ENTRY, self.new_journal_entry.is_some());
        caps.set(
            Capabilities::ACTION_JOURNAL_ENTRY,
            self.action_journal_entry.is_some(),
        );
        caps.set(Capabilities::ACTION_COMMAND, self.action_command.is_some());
        caps.set(Capabilities::TERMINATE, self.terminate.is_some());
        caps
    }

    /// Resolve the table from a loaded library.
    ///
    /// # Safety
    /// The exported symbols must have the signatures declared in [`abi`]. The
    /// returned pointers are only valid while `library` stays loaded.
    pub unsafe fn resolve(library: &Library, path: &Path) -> Result<Self> {
        let initialise = library
            .get::<InitialiseFn>(symbols::INITIALISE)
            .map(|sym| *sym)
            .map_err(|_| PluginError::MissingEntryPoint {
                symbol: symbols::display(symbols::INITIALISE),
                path: path.display().to_string(),
            })?;

        Ok(Self {
            initialise,
            refresh: optional(library, symbols::REFRESH),
            new_journal_entry: optional(library, symbols::NEW_JOURNAL_ENTRY),
            action_journal_entry: optional(library, symbols::ACTION_JOURNAL_ENTRY),
            action_command: optional(library, symbols::ACTION_COMMAND),
            terminate: optional(library, symbols::TERMINATE),
        })
    }
}

impl fmt::Debug for EntryPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoints")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

unsafe fn optional<T: Copy + 'static>(library: &Library, symbol: &[u8]) -> Option<T> {
    library.get::<T>(symbol).ok().map(|sym| *sym)
}

/// A library (if any) plus its entry points, as produced by a [`ModuleOpener`].
pub struct OpenedModule {
    library: Option<Library>,
    entry_points: EntryPoints,
}

impl OpenedModule {
    pub fn native(library: Library, entry_points: EntryPoints) -> Self {
        Self {
            library: Some(library),
            entry_points,
        }
    }

    /// Entry points that live in the host process itself.
    pub fn in_process(entry_points: EntryPoints) -> Self {
        Self {
            library: None,
            entry_points,
        }
    }

    pub fn entry_points(&self) -> &EntryPoints {
        &self.entry_points
    }
}

/// Maps a candidate file to a loaded module.
pub trait ModuleOpener {
    /// Load `path` and resolve at least the mandatory entry point.
    fn open(&self, path: &Path) -> Result<OpenedModule>;
}

/// Opener backed by the platform dynamic loader.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeOpener;

impl ModuleOpener for NativeOpener {
    fn open(&self, path: &Path) -> Result<OpenedModule> {
        // SAFETY: loading runs the library's initializers. Plugins are trusted
        // code by contract.
        let library = unsafe { Library::new(path) }
            .map_err(|e| PluginError::LoadFailed(format!("{}: {}", path.display(), e)))?;

        // SAFETY: the table is stored next to the library and dropped with it.
        let entry_points = unsafe { EntryPoints::resolve(&library, path)? };

        Ok(OpenedModule::native(library, entry_points))
    }
}

/// Summary of a loaded module for display.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub path: PathBuf,
    pub version: String,
    pub capabilities: Vec<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// One native plugin module.
pub struct ModuleHandle {
    name: String,
    path: PathBuf,
    state: LoadState,
    version_info: String,
    library: Option<Library>,
    entry_points: Option<EntryPoints>,
    loaded_at: Option<DateTime<Utc>>,
}

impl ModuleHandle {
    /// An empty handle in state [`LoadState::Unloaded`].
    pub fn new() -> Self {
        Self {
            name: String::new(),
            path: PathBuf::new(),
            state: LoadState::Unloaded,
            version_info: String::new(),
            library: None,
            entry_points: None,
            loaded_at: None,
        }
    }

    /// A [`LoadState::Loaded`] handle over in-process entry points.
    pub fn from_entry_points(name: impl Into<String>, entry_points: EntryPoints) -> Self {
        let mut handle = Self::new();
        handle.name = name.into();
        handle.entry_points = Some(entry_points);
        handle.state = LoadState::Loaded;
        handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Raw string returned by the initialise entry point.
    pub fn version_info(&self) -> &str {
        &self.version_info
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn is_ready(&self) -> bool {
        self.state == LoadState::Ready
    }

    pub fn capabilities(&self) -> Capabilities {
        self.entry_points
            .as_ref()
            .map(EntryPoints::capabilities)
            .unwrap_or_default()
    }

    pub fn info(&self) -> ModuleInfo {
        ModuleInfo {
            name: self.name.clone(),
            path: self.path.clone(),
            version: self.version_info.clone(),
            capabilities: self.capabilities().names(),
            loaded_at: self.loaded_at,
        }
    }

    /// Diagnostic left by a failed init: `version_info` without its marker.
    pub fn init_diagnostic(&self) -> Option<&str> {
        let detail = abi::strip_marker(&self.version_info);
        if detail.is_empty() {
            None
        } else {
            Some(detail)
        }
    }

    /// Load `path` through the platform dynamic loader.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.load_with(path, &NativeOpener)
    }

    /// Load `path` through `opener`.
    pub fn load_with(&mut self, path: impl AsRef<Path>, opener: &dyn ModuleOpener) -> Result<()> {
        let path = path.as_ref();
        if self.state != LoadState::Unloaded {
            return Err(self.invalid_state());
        }

        match opener.open(path) {
            Ok(opened) => {
                self.name = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.path = path.to_path_buf();
                self.library = opened.library;
                self.entry_points = Some(opened.entry_points);
                self.state = LoadState::Loaded;
                debug!(
                    module = %self.name,
                    capabilities = ?self.capabilities(),
                    "Loaded module {}",
                    path.display()
                );
                Ok(())
            }
            Err(e) => {
                self.state = LoadState::NativeLoadFailed;
                Err(e)
            }
        }
    }

    /// Call the mandatory initialise entry point.
    ///
    /// `callbacks` must outlive the module: plugins may keep the pointer.
    pub fn init(
        &mut self,
        host_version: &str,
        plugin_dir: impl AsRef<Path>,
        callbacks: &HostCallbacks,
    ) -> Result<()> {
        let initialise = match (self.state, self.entry_points.as_ref()) {
            (LoadState::Loaded, Some(entry_points)) => entry_points.initialise,
            _ => return Err(self.invalid_state()),
        };

        let args = abi::to_c_string(host_version).and_then(|version| {
            let dir = abi::to_c_string(&plugin_dir.as_ref().to_string_lossy())?;
            Ok((version, dir))
        });
        let (host_version, plugin_dir) = match args {
            Ok(args) => args,
            Err(e) => {
                self.version_info = format!("{}{}", abi::INIT_FAILURE_MARKER, e);
                self.state = LoadState::InitFailed;
                return Err(e);
            }
        };

        // SAFETY: arguments are valid C strings for the duration of the call;
        // the returned string is copied before anything else calls the module.
        let raw = unsafe {
            abi::copy_c_str(initialise(
                host_version.as_ptr(),
                plugin_dir.as_ptr(),
                callbacks as *const HostCallbacks,
            ))
        };
        self.version_info = raw.clone().unwrap_or_default();

        match InitStatus::decode(raw.as_deref()) {
            InitStatus::Ready(_) => {
                self.state = LoadState::Ready;
                self.loaded_at = Some(Utc::now());
                Ok(())
            }
            InitStatus::Failed(detail) => {
                self.state = LoadState::InitFailed;
                Err(PluginError::InitializationFailed(if detail.is_empty() {
                    self.name.clone()
                } else {
                    format!("{}: {}", self.name, detail)
                }))
            }
        }
    }

    /// Terminate (if Ready) and release the library. Idempotent.
    pub fn unload(&mut self) {
        if self.state == LoadState::Ready {
            if let Some(terminate) = self.entry_points.and_then(|ep| ep.terminate) {
                // SAFETY: library is still loaded at this point.
                unsafe { terminate() };
            }
        }

        self.entry_points = None;
        if let Some(library) = self.library.take() {
            if let Err(e) = library.close() {
                warn!(module = %self.name, "Failed to close library: {}", e);
            }
        }

        if matches!(self.state, LoadState::Loaded | LoadState::Ready) {
            debug!(module = %self.name, "Unloaded module");
            self.state = LoadState::Unloaded;
        }
    }

    /// Forward a refresh notification. No-op when unbound.
    pub fn refresh(&self, commander: &str, entry: &JournalEntry) {
        let Some(refresh) = self.bound(|ep| ep.refresh) else {
            return;
        };

        let marshalled = abi::to_c_string(commander)
            .and_then(|commander| Ok((commander, entry.to_c_string()?)));
        match marshalled {
            // SAFETY: both pointers are valid for the duration of the call.
            Ok((commander, entry)) => unsafe { refresh(commander.as_ptr(), entry.as_ptr()) },
            Err(e) => warn!(
                module = %self.name,
                event = ?entry.event_name(),
                "Skipping refresh: {}",
                e
            ),
        }
    }

    /// Forward a new journal entry. No-op when unbound.
    pub fn new_journal_entry(&self, entry: &JournalEntry) {
        let Some(new_journal_entry) = self.bound(|ep| ep.new_journal_entry) else {
            return;
        };

        match entry.to_c_string() {
            // SAFETY: pointer is valid for the duration of the call.
            Ok(entry) => unsafe { new_journal_entry(entry.as_ptr()) },
            Err(e) => warn!(
                module = %self.name,
                event = ?entry.event_name(),
                "Skipping journal entry: {}",
                e
            ),
        }
    }

    /// Ask the module to act on a journal entry. `false` when unbound.
    pub fn action_journal_entry(&self, entry: &JournalEntry) -> bool {
        let Some(action_journal_entry) = self.bound(|ep| ep.action_journal_entry) else {
            return false;
        };

        match entry.to_c_string() {
            // SAFETY: pointer is valid for the duration of the call.
            Ok(entry) => unsafe { action_journal_entry(entry.as_ptr()) },
            Err(e) => {
                warn!(
                    module = %self.name,
                    event = ?entry.event_name(),
                    "Skipping journal action: {}",
                    e
                );
                false
            }
        }
    }

    /// Run a command. `None` means the module does not implement commands.
    pub fn action_command(&self, cmd: &str, args: &[&str]) -> Option<CommandReply> {
        let action_command = self.bound(|ep| ep.action_command)?;

        let (cmd, args) = match marshal_command(cmd, args) {
            Ok(marshalled) => marshalled,
            Err(e) => return Some(CommandReply::failure(e.to_string())),
        };
        let argv: Vec<*const c_char> = args.iter().map(|arg| arg.as_ptr()).collect();

        // SAFETY: `cmd`, `args` and `argv` outlive the call; the response is
        // copied before returning.
        let raw = unsafe { abi::copy_c_str(action_command(cmd.as_ptr(), argv.as_ptr(), argv.len())) };
        raw.map(|raw| CommandReply::decode(&raw))
    }

    fn bound<F>(&self, slot: impl FnOnce(&EntryPoints) -> Option<F>) -> Option<F> {
        if self.state != LoadState::Ready {
            return None;
        }
        self.entry_points.as_ref().and_then(slot)
    }

    fn invalid_state(&self) -> PluginError {
        PluginError::InvalidState {
            name: self.name.clone(),
            state: self.state,
        }
    }
}

fn marshal_command(cmd: &str, args: &[&str]) -> Result<(CString, Vec<CString>)> {
    let cmd = abi::to_c_string(cmd)?;
    let args = args
        .iter()
        .map(|arg| abi::to_c_string(arg))
        .collect::<Result<Vec<_>>>()?;
    Ok((cmd, args))
}

impl Default for ModuleHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ModuleHandle {
    fn drop(&mut self) {
        self.unload();
    }
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("state", &self.state)
            .field("version_info", &self.version_info)
            .field("capabilities", &self.capabilities())
            .finish()
    }
}
