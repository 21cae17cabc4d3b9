//! The opaque C ABI a plugin library exports (spec §4.3, §6).
//!
//! Two entry points per library (`get_number_of_plugins`,
//! `get_plugin`), and per-descriptor a `set_host` callback plus a single
//! `main_entry_point` dispatch function. Actions and property names
//! "follow the published image-effect standard" (spec §6) without this
//! crate redefining them; the ABI below is the minimal opaque shape the
//! host needs to call through, matching spec §9's "wrap `PropertySet`
//! behind a safe facade" design note.

use std::os::raw::{c_char, c_int, c_void};

/// `get_number_of_plugins() -> int` symbol name (spec §4.3, §6).
pub const SYM_GET_NUMBER_OF_PLUGINS: &[u8] = b"get_number_of_plugins";
/// `get_plugin(index) -> PluginDescriptor` symbol name (spec §4.3, §6).
pub const SYM_GET_PLUGIN: &[u8] = b"get_plugin";

/// The action names the host dispatches (spec §4.3 state machine).
pub mod actions {
    /// Load the plugin (first transition, `Unloaded -> Loaded`).
    pub const LOAD: &str = "Load";
    /// Fill the plugin's capability property set (`Loaded -> Described`).
    pub const DESCRIBE: &str = "Describe";
    /// Produce an opaque instance handle (`Described -> Instantiated`).
    pub const CREATE_INSTANCE: &str = "CreateInstance";
    /// Render one frame through an instance (`Instantiated/Active -> Active`).
    pub const RENDER: &str = "Render";
    /// Release an instance (`Active -> Described`).
    pub const DESTROY_INSTANCE: &str = "DestroyInstance";
    /// Unload the plugin (`Described -> Unloaded`).
    pub const UNLOAD: &str = "Unload";
}

/// Status a plugin's main entry point returns. Non-zero is a failure
/// (spec §4.3 "Action failures return an error status").
pub type Status = c_int;

/// Success status.
pub const STATUS_OK: Status = 0;

/// A plugin descriptor, as exported by the plugin library's
/// `get_plugin(index)` (spec §4.3, §6). `#[repr(C)]` because it crosses
/// the dynamic-library boundary.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PluginDescriptor {
    /// Null-terminated API name the plugin targets.
    pub api_name: *const c_char,
    /// API version number.
    pub api_version: c_int,
    /// Null-terminated globally-unique plugin identifier.
    pub identifier: *const c_char,
    /// Major version.
    pub version_major: c_int,
    /// Minor version.
    pub version_minor: c_int,
    /// Invoked once per plugin with a host property set describing host
    /// capabilities (spec §4.3 "The host invokes the set-host callback
    /// once per plugin").
    pub set_host: extern "C" fn(host_properties: *mut c_void),
    /// `(action, handle, in_args, out_args) -> status` (spec §4.3, §6).
    pub main_entry_point:
        extern "C" fn(action: *const c_char, handle: *mut c_void, in_args: *mut c_void, out_args: *mut c_void) -> Status,
}

/// `get_number_of_plugins() -> int` function pointer type.
pub type GetNumberOfPluginsFn = unsafe extern "C" fn() -> c_int;
/// `get_plugin(index) -> *const PluginDescriptor` function pointer type.
pub type GetPluginFn = unsafe extern "C" fn(index: c_int) -> *const PluginDescriptor;

/// Safely copy a descriptor's null-terminated C strings into owned Rust
/// `String`s.
///
/// # Safety
/// `descriptor.api_name` and `descriptor.identifier` must be valid,
/// null-terminated, UTF-8-ish C strings for the lifetime of this call (the
/// contract a well-behaved plugin library must uphold).
pub unsafe fn read_descriptor_strings(descriptor: &PluginDescriptor) -> (String, String) {
    unsafe {
        let api_name = std::ffi::CStr::from_ptr(descriptor.api_name)
            .to_string_lossy()
            .into_owned();
        let identifier = std::ffi::CStr::from_ptr(descriptor.identifier)
            .to_string_lossy()
            .into_owned();
        (api_name, identifier)
    }
}
