//! C ABI shared between the host and native plugins.
//!
//! A plugin is a dynamic library that exports `plughost_initialise` and any
//! subset of the optional entry points listed in [`symbols`]:
//!
//! ```c
//! // Required
//! const char* plughost_initialise(const char* host_version,
//!                                 const char* plugin_dir,
//!                                 const HostCallbacks* callbacks);
//!
//! // Optional
//! void        plughost_refresh(const char* commander, const char* entry_json);
//! void        plughost_new_journal_entry(const char* entry_json);
//! bool        plughost_action_journal_entry(const char* entry_json);
//! const char* plughost_action_command(const char* cmd, const char** argv, size_t argc);
//! void        plughost_terminate(void);
//! ```
//!
//! Strings returned by a plugin are owned by the plugin and must stay valid
//! until the next call into the same entry point. The host copies them
//! immediately.
//!
//! Status strings use a one-character sentinel prefix. They are decoded here
//! into [`InitStatus`] and [`CommandReply`] so nothing above this module deals
//! with the raw convention.

use std::ffi::{c_char, c_void, CStr, CString};

use crate::error::Result;

/// Version of the [`HostCallbacks`] layout handed to plugins.
pub const HOST_ABI_VERSION: u32 = 1;

/// First character of an initialise result that marks failure.
pub const INIT_FAILURE_MARKER: char = '!';

/// First character of a command response that marks success.
pub const COMMAND_SUCCESS_MARKER: char = '+';

/// First character the SDK writes for a failed command response.
pub const COMMAND_FAILURE_MARKER: char = '-';

/// Exported symbol names (NUL-terminated for `libloading`).
pub mod symbols {
    pub const INITIALISE: &[u8] = b"plughost_initialise\0";
    pub const REFRESH: &[u8] = b"plughost_refresh\0";
    pub const NEW_JOURNAL_ENTRY: &[u8] = b"plughost_new_journal_entry\0";
    pub const ACTION_JOURNAL_ENTRY: &[u8] = b"plughost_action_journal_entry\0";
    pub const ACTION_COMMAND: &[u8] = b"plughost_action_command\0";
    pub const TERMINATE: &[u8] = b"plughost_terminate\0";

    /// Symbol name without the trailing NUL, for messages.
    pub fn display(symbol: &[u8]) -> String {
        String::from_utf8_lossy(symbol.strip_suffix(b"\0").unwrap_or(symbol)).into_owned()
    }
}

pub type InitialiseFn =
    unsafe extern "C" fn(*const c_char, *const c_char, *const HostCallbacks) -> *const c_char;
pub type RefreshFn = unsafe extern "C" fn(*const c_char, *const c_char);
pub type NewJournalEntryFn = unsafe extern "C" fn(*const c_char);
pub type ActionJournalEntryFn = unsafe extern "C" fn(*const c_char) -> bool;
pub type ActionCommandFn =
    unsafe extern "C" fn(*const c_char, *const *const c_char, usize) -> *const c_char;
pub type TerminateFn = unsafe extern "C" fn();

/// Host callback: `log(context, level, message)`.
pub type LogCallback = unsafe extern "C" fn(*mut c_void, u32, *const c_char);

/// Host callback: `run_action(context, action, args_json) -> accepted`.
pub type RunActionCallback =
    unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char) -> bool;

/// Table of host functions a plugin may call back into.
///
/// The pointer passed to `plughost_initialise` stays valid until the plugin
/// is terminated.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostCallbacks {
    pub abi_version: u32,
    /// Opaque host pointer passed back as the first callback argument.
    pub context: *mut c_void,
    pub log: Option<LogCallback>,
    pub run_action: Option<RunActionCallback>,
}

impl Default for HostCallbacks {
    fn default() -> Self {
        Self {
            abi_version: HOST_ABI_VERSION,
            context: std::ptr::null_mut(),
            log: None,
            run_action: None,
        }
    }
}

impl HostCallbacks {
    pub fn with_log(mut self, log: LogCallback) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_run_action(mut self, run_action: RunActionCallback) -> Self {
        self.run_action = Some(run_action);
        self
    }
}

/// Severity passed to the host `log` callback.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl LogLevel {
    pub fn from_raw(level: u32) -> Option<Self> {
        match level {
            1 => Some(LogLevel::Error),
            2 => Some(LogLevel::Warn),
            3 => Some(LogLevel::Info),
            4 => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

/// Decoded result of `plughost_initialise`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitStatus {
    /// Plugin accepted the host; carries its version string.
    Ready(String),
    /// Plugin refused; carries the diagnostic (may be empty).
    Failed(String),
}

impl InitStatus {
    /// Success iff the string is present, non-empty and not `!`-prefixed.
    pub fn decode(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if !s.is_empty() && !s.starts_with(INIT_FAILURE_MARKER) => {
                InitStatus::Ready(s.to_string())
            }
            Some(s) => InitStatus::Failed(strip_marker(s).to_string()),
            None => InitStatus::Failed(String::new()),
        }
    }

    /// Wire form written by plugins.
    ///
    /// A ready version is never empty or `!`-prefixed on the wire, so it
    /// always decodes back as ready.
    pub fn encode(&self) -> String {
        match self {
            InitStatus::Ready(version) => {
                let version = version.trim_start_matches(INIT_FAILURE_MARKER);
                if version.is_empty() {
                    "unknown".to_string()
                } else {
                    version.to_string()
                }
            }
            InitStatus::Failed(detail) => format!("{}{}", INIT_FAILURE_MARKER, detail),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, InitStatus::Ready(_))
    }
}

/// Decoded response of `plughost_action_command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub ok: bool,
    pub message: String,
}

impl CommandReply {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }

    /// Leading `+` is success, anything else failure; the first character is
    /// always dropped from the message.
    pub fn decode(raw: &str) -> Self {
        Self {
            ok: raw.starts_with(COMMAND_SUCCESS_MARKER),
            message: strip_marker(raw).to_string(),
        }
    }

    pub fn encode(&self) -> String {
        let marker = if self.ok {
            COMMAND_SUCCESS_MARKER
        } else {
            COMMAND_FAILURE_MARKER
        };
        format!("{}{}", marker, self.message)
    }
}

/// Drop the first character (not byte) of a sentinel-prefixed string.
pub fn strip_marker(raw: &str) -> &str {
    let mut chars = raw.chars();
    chars.next();
    chars.as_str()
}

/// Convert a host string for the C side.
pub fn to_c_string(value: &str) -> Result<CString> {
    Ok(CString::new(value)?)
}

/// Copy a plugin-owned C string into an owned `String`.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid for
/// the duration of the call.
pub unsafe fn copy_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}
