//! Out-of-process image-effect plugin boundary: opaque property sets,
//! typed handles, and a single dispatch entry point (spec §1, §4.3).

pub mod abi;
pub mod discover;
mod host;
mod instance;

pub use host::{PluginDispatch, PluginHandle, PluginHost, PluginHostOptions, RawDispatch};
pub use instance::{PluginInstance, PluginState};
