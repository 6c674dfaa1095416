//! Declarative macros for plugin development.

/// Export a [`Plugin`](crate::Plugin) type as a native plugin.
///
/// Emits all six `plughost_*` entry points. `$constructor` builds a fresh
/// instance each time the host calls `plughost_initialise`; the instance is
/// kept only if initialise succeeds.
///
/// One invocation per library: the generated symbols are unmangled.
///
/// # Example
///
/// ```rust,ignore
/// use plughost_sdk::prelude::*;
///
/// #[derive(Default)]
/// struct Quiet;
///
/// impl Plugin for Quiet {
///     fn initialise(&mut self, _host: HostInfo) -> Result<String, String> {
///         Ok("1.0".into())
///     }
/// }
///
/// export_plugin!(Quiet, Quiet::default);
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($plugin_type:ty, $constructor:expr) => {
        static PLUGHOST_PLUGIN: $crate::runtime::PluginCell<$plugin_type> =
            $crate::runtime::PluginCell::new();

        #[no_mangle]
        pub unsafe extern "C" fn plughost_initialise(
            host_version: *const ::std::ffi::c_char,
            plugin_dir: *const ::std::ffi::c_char,
            callbacks: *const $crate::abi::HostCallbacks,
        ) -> *const ::std::ffi::c_char {
            PLUGHOST_PLUGIN.initialise($constructor, host_version, plugin_dir, callbacks)
        }

        #[no_mangle]
        pub unsafe extern "C" fn plughost_refresh(
            commander: *const ::std::ffi::c_char,
            entry_json: *const ::std::ffi::c_char,
        ) {
            PLUGHOST_PLUGIN.refresh(commander, entry_json)
        }

        #[no_mangle]
        pub unsafe extern "C" fn plughost_new_journal_entry(
            entry_json: *const ::std::ffi::c_char,
        ) {
            PLUGHOST_PLUGIN.new_journal_entry(entry_json)
        }

        #[no_mangle]
        pub unsafe extern "C" fn plughost_action_journal_entry(
            entry_json: *const ::std::ffi::c_char,
        ) -> bool {
            PLUGHOST_PLUGIN.action_journal_entry(entry_json)
        }

        #[no_mangle]
        pub unsafe extern "C" fn plughost_action_command(
            cmd: *const ::std::ffi::c_char,
            argv: *const *const ::std::ffi::c_char,
            argc: usize,
        ) -> *const ::std::ffi::c_char {
            PLUGHOST_PLUGIN.action_command(cmd, argv, argc)
        }

        #[no_mangle]
        pub unsafe extern "C" fn plughost_terminate() {
            PLUGHOST_PLUGIN.terminate()
        }
    };
}
