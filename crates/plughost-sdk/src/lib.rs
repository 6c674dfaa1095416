//! plughost Plugin SDK
//!
//! Write a plugin as a plain Rust type and let [`export_plugin!`] emit the C
//! entry points the host looks for.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use plughost_sdk::prelude::*;
//!
//! #[derive(Default)]
//! struct Jumps {
//!     count: u64,
//! }
//!
//! impl Plugin for Jumps {
//!     fn initialise(&mut self, host: HostInfo) -> Result<String, String> {
//!         host.host.log(LogLevel::Info, "jump counter ready");
//!         Ok(env!("CARGO_PKG_VERSION").to_string())
//!     }
//!
//!     fn new_journal_entry(&mut self, entry: &Value) {
//!         if entry["event"] == "FSDJump" {
//!             self.count += 1;
//!         }
//!     }
//!
//!     fn action_command(&mut self, cmd: &str, _args: &[String]) -> Option<Result<String, String>> {
//!         match cmd {
//!             "jumps" => Some(Ok(self.count.to_string())),
//!             _ => Some(Err(format!("unknown command {}", cmd))),
//!         }
//!     }
//! }
//!
//! export_plugin!(Jumps, Jumps::default);
//! ```
//!
//! Build the crate as a `cdylib` and drop the library into the host's plugin
//! directory.

pub mod host;
#[macro_use]
pub mod macros;
#[doc(hidden)]
pub mod runtime;

pub use host::{HostHandle, HostInfo};
pub use plughost_core::abi;
pub use plughost_core::abi::LogLevel;

use serde_json::Value;

/// A native plugin.
///
/// Only [`initialise`](Plugin::initialise) is required. The defaults of the
/// other methods mean "no opinion": ignore notifications, decline journal
/// actions and report commands as not implemented.
pub trait Plugin: Send + 'static {
    /// Accept the host (`Ok(version)`) or refuse it (`Err(reason)`).
    fn initialise(&mut self, host: HostInfo) -> Result<String, String>;

    /// Replay of a historic entry for `commander`.
    fn refresh(&mut self, _commander: &str, _entry: &Value) {}

    fn new_journal_entry(&mut self, _entry: &Value) {}

    /// Return true if the plugin acted on `entry`.
    fn action_journal_entry(&mut self, _entry: &Value) -> bool {
        false
    }

    /// `None` when the plugin does not implement commands.
    fn action_command(&mut self, _cmd: &str, _args: &[String]) -> Option<Result<String, String>> {
        None
    }

    /// Called once before the host releases the library.
    fn terminate(&mut self) {}
}

/// Prelude module with common imports
pub mod prelude {
    pub use crate::export_plugin;
    pub use crate::host::{HostHandle, HostInfo};
    pub use crate::Plugin;
    pub use plughost_core::abi::LogLevel;
    pub use serde_json::Value;
}
