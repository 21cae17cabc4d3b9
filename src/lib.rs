//! toucan-rs is the core of a non-linear timeline renderer: per-frame
//! traversal of an opaque edit-decision document, assembly of an
//! image-processing node graph, and an out-of-process-style plugin host
//! for effects the core does not implement itself.
//!
//! The public surface is traversal-oriented:
//!
//! - Implement [`timeline_doc::TimelineDocument`] over your own
//!   edit-decision model (or use [`timeline_doc::InMemoryTimeline`]).
//! - Build an [`effect_registry::EffectRegistry`] (start from
//!   [`effect_registry::EffectRegistry::with_builtins`]).
//! - Call [`graph_builder::GraphBuilder::build_frame`] at a timeline time to
//!   get the root [`image_node::NodeRef`] for that frame, then
//!   [`image_node::ImageNode::exec`] it against a [`media_io::MediaIo`] and
//!   an [`image_algebra::ImageAlgebra`] collaborator.
//!
//! The plugin host's dynamic-library loading and the memory-mapped media
//! path need `unsafe` at the FFI/raw-pointer boundary; every use is scoped
//! to `plugin_host` and `media_io::mmap` and documented at the call site,
//! so the crate does not carry a blanket `forbid(unsafe_code)`.
#![deny(missing_docs)]

pub mod effect_registry;
pub mod file_utils;
pub mod foundation;
pub mod graph_builder;
pub mod image_algebra;
pub mod image_node;
pub mod media_io;
pub mod plugin_host;
pub mod property_set;
pub mod time;
pub mod timeline_doc;

pub use crate::effect_registry::EffectRegistry;
pub use crate::foundation::error::{PropertyErrorKind, ToucanError, ToucanResult};
pub use crate::graph_builder::{GraphBuilder, GraphBuilderOptions};
pub use crate::image_algebra::{CpuImageAlgebra, FilterKind, Image, ImageAlgebra, ImageSpec, NoiseKind};
pub use crate::image_node::{ImageNode, NodeRef, NodeVariant};
pub use crate::media_io::{MediaIo, RasterIo};
pub use crate::plugin_host::{PluginDispatch, PluginHandle, PluginHost, PluginHostOptions, PluginInstance, PluginState, RawDispatch};
pub use crate::property_set::{PropertyKind, PropertySet, PropertyValue};
pub use crate::time::{RationalTime, TimeRange};
pub use crate::timeline_doc::{
    Clip, EffectDescriptor, Gap, InMemoryTimeline, Item, MediaReference, ParamReader, ParamWriter, TimeTransform, TimelineDocument, Track, TrackKind,
    TransitionItem,
};
