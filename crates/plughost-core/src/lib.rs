//! Native plugin host.
//!
//! Discovers dynamic libraries in a directory, loads the ones that export the
//! plugin ABI, applies an allow-list, and routes journal entries and commands
//! to them.
//!
//! # Usage
//!
//! ```rust,no_run
//! use plughost_core::prelude::*;
//!
//! let config = HostConfig::from_env();
//! let mut manager = PluginManager::new();
//! let report = manager.load(
//!     &config.plugin_dir,
//!     &config.host_version,
//!     config.storage_dir(),
//!     &tracing_callbacks(),
//!     &config.allow,
//! );
//! println!("loaded: {}", report.loaded_list());
//!
//! for result in manager.action_command(&Target::All, "status", &[]) {
//!     println!("{} {} {}", result.ok, result.module, result.message);
//! }
//!
//! manager.unload();
//! ```

pub mod abi;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod journal;
pub mod manager;
pub mod module;
pub mod policy;

pub use abi::{CommandReply, HostCallbacks, InitStatus, LogLevel, HOST_ABI_VERSION};
pub use callbacks::tracing_callbacks;
pub use config::HostConfig;
pub use error::{PluginError, Result};
pub use journal::JournalEntry;
pub use manager::{CommandResult, JournalOutcome, LoadReport, PluginManager};
pub use module::{
    Capabilities, EntryPoints, LoadState, ModuleHandle, ModuleInfo, ModuleOpener, NativeOpener,
    OpenedModule,
};
pub use policy::{AllowPolicy, Target};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::abi::{CommandReply, HostCallbacks};
    pub use crate::callbacks::tracing_callbacks;
    pub use crate::config::HostConfig;
    pub use crate::error::{PluginError, Result};
    pub use crate::journal::JournalEntry;
    pub use crate::manager::{CommandResult, JournalOutcome, LoadReport, PluginManager};
    pub use crate::module::{EntryPoints, ModuleHandle, ModuleOpener, OpenedModule};
    pub use crate::policy::{AllowPolicy, Target};
}
