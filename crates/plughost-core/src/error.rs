//! Error type for plugin loading and dispatch.
//!
//! Only handle-level operations surface these errors. The manager folds every
//! per-module failure into its report types instead.

use crate::module::LoadState;

/// Plugin error types.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// The platform loader rejected the file.
    #[error("Failed to load plugin: {0}")]
    LoadFailed(String),

    /// The library loaded but does not export a required symbol.
    #[error("Missing entry point {symbol} in {path}")]
    MissingEntryPoint { symbol: String, path: String },

    /// The plugin's initialise entry point reported failure.
    #[error("Plugin initialization failed: {0}")]
    InitializationFailed(String),

    /// Operation is not valid in the handle's current state.
    #[error("Plugin {name} is {state}")]
    InvalidState { name: String, state: LoadState },

    /// A string could not be passed across the C boundary.
    #[error("Invalid string for plugin ABI: {0}")]
    InvalidString(#[from] std::ffi::NulError),

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Journal entry (de)serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;
