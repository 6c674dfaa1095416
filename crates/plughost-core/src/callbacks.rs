//! Host callback table that routes plugin requests into `tracing`.

use std::ffi::{c_char, c_void};

use tracing::{debug, error, info, warn};

use crate::abi::{copy_c_str, HostCallbacks, LogLevel};

/// Target used for messages logged by plugins.
pub const PLUGIN_LOG_TARGET: &str = "plughost::plugin";

/// Callbacks whose `log` writes to `tracing` and whose `run_action` only
/// records the request and declines it.
pub fn tracing_callbacks() -> HostCallbacks {
    HostCallbacks::default()
        .with_log(log_to_tracing)
        .with_run_action(decline_action)
}

unsafe extern "C" fn log_to_tracing(_context: *mut c_void, level: u32, message: *const c_char) {
    let Some(message) = copy_c_str(message) else {
        return;
    };

    match LogLevel::from_raw(level) {
        Some(LogLevel::Error) => error!(target: PLUGIN_LOG_TARGET, "{}", message),
        Some(LogLevel::Warn) => warn!(target: PLUGIN_LOG_TARGET, "{}", message),
        Some(LogLevel::Debug) => debug!(target: PLUGIN_LOG_TARGET, "{}", message),
        Some(LogLevel::Info) | None => info!(target: PLUGIN_LOG_TARGET, "{}", message),
    }
}

unsafe extern "C" fn decline_action(
    _context: *mut c_void,
    action: *const c_char,
    args_json: *const c_char,
) -> bool {
    let action = copy_c_str(action).unwrap_or_default();
    let args = copy_c_str(args_json).unwrap_or_default();
    info!(target: PLUGIN_LOG_TARGET, action = %action, args = %args, "Plugin requested action");
    false
}
