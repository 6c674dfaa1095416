//! State behind the entry points generated by [`export_plugin!`](crate::export_plugin).
//!
//! Not meant to be used directly.

use std::ffi::{c_char, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use parking_lot::{const_mutex, Mutex};
use plughost_core::abi::{CommandReply, HostCallbacks, InitStatus};
use serde_json::Value;

use crate::host::HostInfo;
use crate::Plugin;

/// Failure message reported when a command handler panics.
pub const COMMAND_PANICKED: &str = "plugin panicked";

/// The single plugin instance of a library plus its reply buffers.
///
/// A reply pointer stays valid until the next call into the same entry point.
pub struct PluginCell<P> {
    plugin: Mutex<Option<P>>,
    init_reply: Mutex<Option<CString>>,
    command_reply: Mutex<Option<CString>>,
}

impl<P: Plugin> PluginCell<P> {
    pub const fn new() -> Self {
        Self {
            plugin: const_mutex(None),
            init_reply: const_mutex(None),
            command_reply: const_mutex(None),
        }
    }

    /// # Safety
    /// Pointers must be null or valid for the duration of the call.
    pub unsafe fn initialise(
        &self,
        constructor: impl FnOnce() -> P,
        host_version: *const c_char,
        plugin_dir: *const c_char,
        callbacks: *const HostCallbacks,
    ) -> *const c_char {
        let host = HostInfo::from_raw(host_version, plugin_dir, callbacks);

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut plugin = constructor();
            let result = plugin.initialise(host);
            (plugin, result)
        }));

        let status = match outcome {
            Ok((plugin, Ok(version))) => {
                *self.plugin.lock() = Some(plugin);
                InitStatus::Ready(version)
            }
            Ok((_, Err(detail))) => InitStatus::Failed(detail),
            Err(_) => InitStatus::Failed("plugin panicked during initialise".to_string()),
        };

        store(&self.init_reply, status.encode())
    }

    /// # Safety
    /// Pointers must be null or valid for the duration of the call.
    pub unsafe fn refresh(&self, commander: *const c_char, entry_json: *const c_char) {
        let Some(entry) = parse_entry(entry_json) else {
            return;
        };
        let commander = if commander.is_null() {
            String::new()
        } else {
            CStr::from_ptr(commander).to_string_lossy().into_owned()
        };
        self.with_plugin((), |plugin| plugin.refresh(&commander, &entry));
    }

    /// # Safety
    /// `entry_json` must be null or valid for the duration of the call.
    pub unsafe fn new_journal_entry(&self, entry_json: *const c_char) {
        let Some(entry) = parse_entry(entry_json) else {
            return;
        };
        self.with_plugin((), |plugin| plugin.new_journal_entry(&entry));
    }

    /// # Safety
    /// `entry_json` must be null or valid for the duration of the call.
    pub unsafe fn action_journal_entry(&self, entry_json: *const c_char) -> bool {
        let Some(entry) = parse_entry(entry_json) else {
            return false;
        };
        self.with_plugin(false, |plugin| plugin.action_journal_entry(&entry))
    }

    /// # Safety
    /// `cmd` must be valid and `argv` must hold `argc` valid strings.
    pub unsafe fn action_command(
        &self,
        cmd: *const c_char,
        argv: *const *const c_char,
        argc: usize,
    ) -> *const c_char {
        if cmd.is_null() {
            return std::ptr::null();
        }
        let cmd = CStr::from_ptr(cmd).to_string_lossy().into_owned();
        let args: Vec<String> = (0..argc)
            .map(|i| *argv.add(i))
            .filter(|arg| !arg.is_null())
            .map(|arg| CStr::from_ptr(arg).to_string_lossy().into_owned())
            .collect();

        let reply = match self.try_with_plugin(|plugin| plugin.action_command(&cmd, &args)) {
            Some(Ok(reply)) => reply,
            Some(Err(_)) => Some(Err(COMMAND_PANICKED.to_string())),
            None => return std::ptr::null(),
        };
        match reply {
            Some(Ok(message)) => store(&self.command_reply, CommandReply::success(message).encode()),
            Some(Err(message)) => store(&self.command_reply, CommandReply::failure(message).encode()),
            None => std::ptr::null(),
        }
    }

    /// Terminate and drop the plugin instance.
    pub fn terminate(&self) {
        if let Some(mut plugin) = self.plugin.lock().take() {
            let _ = catch_unwind(AssertUnwindSafe(|| plugin.terminate()));
        }
    }

    fn with_plugin<R>(&self, fallback: R, f: impl FnOnce(&mut P) -> R) -> R {
        match self.try_with_plugin(f) {
            Some(Ok(result)) => result,
            _ => fallback,
        }
    }

    /// `None` without a live instance, `Some(Err(_))` if the plugin panicked.
    fn try_with_plugin<R>(&self, f: impl FnOnce(&mut P) -> R) -> Option<thread::Result<R>> {
        let mut guard = self.plugin.lock();
        let plugin = guard.as_mut()?;
        Some(catch_unwind(AssertUnwindSafe(|| f(plugin))))
    }
}

impl<P: Plugin> Default for PluginCell<P> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe fn parse_entry(entry_json: *const c_char) -> Option<Value> {
    if entry_json.is_null() {
        return None;
    }
    serde_json::from_slice(CStr::from_ptr(entry_json).to_bytes()).ok()
}

fn store(slot: &Mutex<Option<CString>>, reply: String) -> *const c_char {
    // interior NULs cannot cross the boundary
    let reply = CString::new(reply.replace('\0', " ")).unwrap_or_default();
    let mut slot = slot.lock();
    slot.insert(reply).as_ptr()
}
