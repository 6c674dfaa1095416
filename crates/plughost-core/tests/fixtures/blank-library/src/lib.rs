//! A valid dynamic library that exports none of the plugin entry points.

#[no_mangle]
pub extern "C" fn blank_library_marker() -> u32 {
    7
}
