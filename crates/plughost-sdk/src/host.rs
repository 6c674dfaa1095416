//! Plugin-side view of the host.

use std::ffi::{c_char, CStr, CString};
use std::path::PathBuf;

use plughost_core::abi::{HostCallbacks, LogLevel};
use serde_json::Value;

/// What the host told the plugin at initialise time.
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub host_version: String,
    /// Directory the plugin may use for its own files.
    pub plugin_dir: PathBuf,
    pub host: HostHandle,
}

impl HostInfo {
    /// # Safety
    /// Every pointer must be null or valid for the duration of the call.
    pub unsafe fn from_raw(
        host_version: *const c_char,
        plugin_dir: *const c_char,
        callbacks: *const HostCallbacks,
    ) -> Self {
        Self {
            host_version: lossy(host_version),
            plugin_dir: PathBuf::from(lossy(plugin_dir)),
            host: HostHandle::from_raw(callbacks),
        }
    }
}

unsafe fn lossy(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// Calls back into the host.
///
/// Holds a copy of the host's callback table; every call is a no-op when the
/// host did not provide the callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostHandle {
    callbacks: Option<HostCallbacks>,
}

// SAFETY: the table only holds function pointers and an opaque context the
// host hands out for use from plugin code. Plugins are driven from one host
// thread at a time.
unsafe impl Send for HostHandle {}

impl HostHandle {
    /// # Safety
    /// `callbacks` must be null or point to a valid table.
    pub unsafe fn from_raw(callbacks: *const HostCallbacks) -> Self {
        Self {
            callbacks: callbacks.as_ref().copied(),
        }
    }

    /// ABI version of the host's table, or `None` without a table.
    pub fn abi_version(&self) -> Option<u32> {
        self.callbacks.map(|cb| cb.abi_version)
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        let Some(callbacks) = self.callbacks else {
            return;
        };
        let (Some(log), Ok(message)) = (callbacks.log, CString::new(message)) else {
            return;
        };
        // SAFETY: the host guarantees the table's functions stay callable.
        unsafe { log(callbacks.context, level as u32, message.as_ptr()) }
    }

    /// Ask the host to run `action`. `false` if unsupported or declined.
    pub fn run_action(&self, action: &str, args: &Value) -> bool {
        let Some(callbacks) = self.callbacks else {
            return false;
        };
        let Some(run_action) = callbacks.run_action else {
            return false;
        };
        let (Ok(action), Ok(args)) = (CString::new(action), CString::new(args.to_string())) else {
            return false;
        };
        // SAFETY: see `log`.
        unsafe { run_action(callbacks.context, action.as_ptr(), args.as_ptr()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::c_void;
    use std::sync::atomic::{AtomicU32, Ordering};

    static LAST_LEVEL: AtomicU32 = AtomicU32::new(0);

    unsafe extern "C" fn record_level(_ctx: *mut c_void, level: u32, _message: *const c_char) {
        LAST_LEVEL.store(level, Ordering::SeqCst);
    }

    unsafe extern "C" fn accept_jump(
        _ctx: *mut c_void,
        action: *const c_char,
        _args: *const c_char,
    ) -> bool {
        CStr::from_ptr(action).to_bytes() == b"jump"
    }

    #[test]
    fn test_handle_without_table() {
        let handle = unsafe { HostHandle::from_raw(std::ptr::null()) };
        assert_eq!(handle.abi_version(), None);
        handle.log(LogLevel::Info, "ignored");
        assert!(!handle.run_action("jump", &Value::Null));
    }

    #[test]
    fn test_handle_calls_host() {
        let table = HostCallbacks::default()
            .with_log(record_level)
            .with_run_action(accept_jump);
        let handle = unsafe { HostHandle::from_raw(&table) };

        assert_eq!(handle.abi_version(), Some(plughost_core::HOST_ABI_VERSION));
        handle.log(LogLevel::Warn, "low fuel");
        assert_eq!(LAST_LEVEL.load(Ordering::SeqCst), LogLevel::Warn as u32);
        assert!(handle.run_action("jump", &serde_json::json!({"to": "Sol"})));
        assert!(!handle.run_action("dock", &Value::Null));
    }

    #[test]
    fn test_host_info_from_raw() {
        let info = unsafe {
            HostInfo::from_raw(c"5.0".as_ptr(), c"/var/plugins".as_ptr(), std::ptr::null())
        };
        assert_eq!(info.host_version, "5.0");
        assert_eq!(info.plugin_dir, PathBuf::from("/var/plugins"));
        assert_eq!(info.host.abi_version(), None);
    }
}
