//! The polymorphic image node: inputs, time offset, name, variant-specific
//! execution and Graphviz graph emission (spec §3 "Image node", §4.5).

use crate::foundation::error::ToucanResult;
use crate::image_algebra::{self, FilterKind, Image, ImageAlgebra, ImageSpec, NoiseKind};
use crate::media_io::MediaIo;
use crate::plugin_host::PluginHost;
use crate::time::{RationalTime, TimeRange};
use crate::timeline_doc::MediaReference;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

/// One node in a per-frame image DAG (spec §3 "Image node").
///
/// Shared ownership (`Rc`) lets a node appear as an input to several
/// parents — a transition or composite fanning in the same upstream
/// subgraph — while the DAG invariant (spec §3 "no node reaches itself
/// through `inputs*`") holds by construction: the Graph Builder only ever
/// appends freshly built subtrees, never re-enters a closed one (spec §9).
pub type NodeRef = Rc<ImageNode>;

/// An image node: a stable name, ordered inputs, a time offset, and a
/// variant tag with its payload (spec §3).
pub struct ImageNode {
    /// Human-readable name, used in graph emission (spec §4.5).
    pub name: String,
    /// Ordered input nodes.
    pub inputs: Vec<NodeRef>,
    /// Subtracted from the evaluation time before forwarding to inputs,
    /// encoding source↔timeline time (spec §3).
    pub time_offset: RationalTime,
    /// The variant and its parameters.
    pub variant: NodeVariant,
}

/// The fixed set of node variants (spec §3).
pub enum NodeVariant {
    /// Decoded still image; zero inputs.
    Read {
        /// Resolved media reference (an `External` or `Memory` variant).
        media: MediaReference,
        /// Base directory external references resolve against.
        base_dir: String,
    },
    /// Decoded sequence frame; zero inputs.
    SequenceRead {
        /// The `Sequence` media reference.
        media: MediaReference,
        /// Base directory external references resolve against.
        base_dir: String,
    },
    /// Solid-colour synthesis.
    Fill {
        /// Output size.
        size: ImageSpec,
        /// Fill colour.
        color: [f32; 4],
    },
    /// Alternating-square checkerboard synthesis.
    Checkers {
        /// Output size.
        size: ImageSpec,
        /// Checker cell size.
        checker_size: (u32, u32),
        /// First colour.
        color1: [f32; 4],
        /// Second colour.
        color2: [f32; 4],
    },
    /// Typed random field synthesis.
    Noise {
        /// Output size.
        size: ImageSpec,
        /// Distribution kind.
        kind: NoiseKind,
        /// Distribution parameter `a`.
        a: f64,
        /// Distribution parameter `b`.
        b: f64,
        /// Single-channel when `true`.
        mono: bool,
        /// RNG seed (deterministic reproduction).
        seed: u64,
    },
    /// Two-point linear colour ramp synthesis.
    Gradient {
        /// Output size.
        size: ImageSpec,
        /// Ramp start colour.
        color1: [f32; 4],
        /// Ramp end colour.
        color2: [f32; 4],
    },
    /// Glyph rasterization onto a transparent buffer.
    Text {
        /// Output size.
        size: ImageSpec,
        /// Top-left rasterization position.
        pos: (f32, f32),
        /// Text to rasterize.
        text: String,
        /// Point size.
        font_size: f32,
        /// Font family name.
        font_name: String,
        /// Glyph colour.
        color: [f32; 4],
    },
    /// Apply a named colour-map curve to input 0.
    ColorMap {
        /// Curve name.
        map_name: String,
    },
    /// Premultiply input 0's colour channels by alpha.
    Premult,
    /// Divide input 0's colour channels by alpha.
    Unpremult,
    /// Invert input 0's colour channels.
    Invert,
    /// Flip input 0 vertically.
    Flip,
    /// Flip input 0 horizontally.
    Flop,
    /// Per-channel power curve on input 0.
    Pow {
        /// Exponent.
        value: f64,
    },
    /// Saturation adjustment on input 0 (0 = grayscale, 1 = identity).
    Saturate {
        /// Saturation factor.
        value: f64,
    },
    /// Rotate input 0 by `angle_degrees`.
    Rotate {
        /// Rotation angle in degrees.
        angle_degrees: f64,
        /// Resampling filter.
        filter: FilterKind,
    },
    /// Resize input 0 to `size`.
    Resize {
        /// Target size.
        size: ImageSpec,
        /// Resampling filter.
        filter: FilterKind,
    },
    /// Stack inputs with Porter-Duff `over`, input 0 foreground (spec
    /// §4.5 "Composite").
    Composite {
        /// Premultiply the sole input before returning it when there is
        /// exactly one input (spec §4.5).
        premult: bool,
    },
    /// Linear cross-fade between exactly two inputs over `range` (spec
    /// §4.5 "Transition").
    Transition {
        /// The time range (in this node's local time) the blend spans.
        range: TimeRange,
    },
    /// Evaluate input 0 at `floor((time - time_offset) * scalar)` (spec
    /// §4.5 "LinearTimeWarp").
    LinearTimeWarp {
        /// Time-dilation factor.
        scalar: f64,
    },
    /// Route to the plugin host (spec §4.5 "HostEffect").
    HostEffect {
        /// Identifier of the plugin to dispatch to.
        plugin_id: String,
        /// Shared plugin host and the instance this node owns (spec §3
        /// invariant: "holds a reference to a plugin instance whose
        /// lifetime ≥ the node's lifetime").
        host: Arc<PluginHost>,
        /// The created instance.
        instance: Arc<Mutex<crate::plugin_host::PluginInstance>>,
        /// Output size requested from the plugin.
        output_spec: ImageSpec,
    },
}

impl ImageNode {
    /// Construct a leaf node (no inputs) with identity time offset.
    pub fn leaf(name: impl Into<String>, variant: NodeVariant) -> NodeRef {
        Rc::new(Self {
            name: name.into(),
            inputs: Vec::new(),
            time_offset: RationalTime::new(0.0, 1.0),
            variant,
        })
    }

    /// Construct a node with inputs and identity time offset.
    pub fn with_inputs(name: impl Into<String>, inputs: Vec<NodeRef>, variant: NodeVariant) -> NodeRef {
        Rc::new(Self {
            name: name.into(),
            inputs,
            time_offset: RationalTime::new(0.0, 1.0),
            variant,
        })
    }

    /// Builder-style time-offset setter.
    pub fn with_time_offset(mut self, time_offset: RationalTime) -> Self {
        self.time_offset = time_offset;
        self
    }

    /// The graph-emission label: the node's name unless a variant
    /// overrides it (spec §4.5: "label = `getLabel()`, default = name").
    pub fn label(&self) -> String {
        match &self.variant {
            NodeVariant::Composite { .. } => format!("{} (over)", self.name),
            NodeVariant::Transition { .. } => format!("{} (crossfade)", self.name),
            _ => self.name.clone(),
        }
    }

    /// Local time after subtracting `time_offset` (spec §3: "when set, the
    /// node subtracts it from the evaluation time before forwarding to
    /// its inputs"; invalid offsets act as identity, spec §3 "Rational
    /// time").
    fn local_time(&self, time: RationalTime) -> RationalTime {
        time.sub(self.time_offset)
    }

    /// Execute this node at `time`, depth-first (spec §4.5 "Execution
    /// contract").
    pub fn exec(&self, time: RationalTime, io: &dyn MediaIo, algebra: &dyn ImageAlgebra) -> ToucanResult<Image> {
        match &self.variant {
            NodeVariant::Read { media, base_dir } => {
                Ok(crate::media_io::resolve(io, media, base_dir, time, self.time_offset).unwrap_or_else(|e| {
                    tracing::error!(node = %self.name, error = %e, "Read node failed, treating as empty");
                    Image::empty()
                }))
            }
            NodeVariant::SequenceRead { media, base_dir } => {
                Ok(crate::media_io::resolve(io, media, base_dir, time, self.time_offset).unwrap_or_else(|e| {
                    tracing::error!(node = %self.name, error = %e, "SequenceRead node failed, treating as empty");
                    Image::empty()
                }))
            }
            NodeVariant::Fill { size, color } => Ok(algebra.fill(*size, *color)),
            NodeVariant::Checkers { size, checker_size, color1, color2 } => Ok(algebra.checkers(*size, *checker_size, *color1, *color2)),
            NodeVariant::Noise { size, kind, a, b, mono, seed } => Ok(algebra.noise(*size, *kind, *a, *b, *mono, *seed)),
            NodeVariant::Gradient { size, color1, color2 } => Ok(algebra.gradient(*size, *color1, *color2)),
            NodeVariant::Text { size, pos, text, font_size, font_name, color } => {
                Ok(algebra.text(*size, *pos, text, *font_size, font_name, *color))
            }
            NodeVariant::ColorMap { map_name } => {
                let input = self.exec_input(0, time, io, algebra)?;
                Ok(algebra.color_map(&input, map_name))
            }
            NodeVariant::Premult => {
                let input = self.exec_input(0, time, io, algebra)?;
                Ok(image_algebra::premult(&input))
            }
            NodeVariant::Unpremult => {
                let input = self.exec_input(0, time, io, algebra)?;
                Ok(image_algebra::unpremult(&input))
            }
            NodeVariant::Invert => {
                let input = self.exec_input(0, time, io, algebra)?;
                Ok(image_algebra::invert(&input))
            }
            NodeVariant::Flip => {
                let input = self.exec_input(0, time, io, algebra)?;
                Ok(algebra.flip(&input))
            }
            NodeVariant::Flop => {
                let input = self.exec_input(0, time, io, algebra)?;
                Ok(algebra.flop(&input))
            }
            NodeVariant::Pow { value } => {
                let input = self.exec_input(0, time, io, algebra)?;
                Ok(algebra.pow(&input, *value))
            }
            NodeVariant::Saturate { value } => {
                let input = self.exec_input(0, time, io, algebra)?;
                Ok(algebra.saturate(&input, *value))
            }
            NodeVariant::Rotate { angle_degrees, filter } => {
                let input = self.exec_input(0, time, io, algebra)?;
                Ok(algebra.rotate(&input, *angle_degrees, *filter))
            }
            NodeVariant::Resize { size, filter } => {
                let input = self.exec_input(0, time, io, algebra)?;
                Ok(algebra.resize(&input, *size, *filter))
            }
            NodeVariant::Composite { premult } => self.exec_composite(*premult, time, io, algebra),
            NodeVariant::Transition { range } => self.exec_transition(*range, time, io, algebra),
            NodeVariant::LinearTimeWarp { scalar } => self.exec_time_warp(*scalar, time, io, algebra),
            NodeVariant::HostEffect { host, instance, output_spec, .. } => self.exec_host_effect(host, instance, *output_spec, time, io, algebra),
        }
    }

    fn exec_input(&self, index: usize, time: RationalTime, io: &dyn MediaIo, algebra: &dyn ImageAlgebra) -> ToucanResult<Image> {
        match self.inputs.get(index) {
            Some(input) => input.exec(self.local_time(time), io, algebra),
            None => Ok(Image::empty()),
        }
    }

    /// `Composite` semantics (spec §4.5): zero inputs -> empty; one input
    /// -> pass-through (premultiplied when `premult`); ≥2 inputs ->
    /// `over(fg, over(mid, ..., bg))`, input 0 foreground.
    fn exec_composite(&self, premult: bool, time: RationalTime, io: &dyn MediaIo, algebra: &dyn ImageAlgebra) -> ToucanResult<Image> {
        if self.inputs.is_empty() {
            return Ok(Image::empty());
        }
        let local = self.local_time(time);
        if self.inputs.len() == 1 {
            let img = self.inputs[0].exec(local, io, algebra)?;
            return Ok(if premult { image_algebra::premult(&img) } else { img });
        }
        // Fold right-to-left so input 0 ends up as the final foreground
        // over the accumulated background (spec §4.5, §5 "input 0 is
        // foreground"; §9 Open Question: only the foreground side of each
        // `over` is premultiplied here, matching "source suggests
        // foreground-only").
        let mut acc = self.inputs.last().unwrap().exec(local, io, algebra)?;
        for input in self.inputs[..self.inputs.len() - 1].iter().rev() {
            let fg = input.exec(local, io, algebra)?;
            let fg = if premult { image_algebra::premult(&fg) } else { fg };
            acc = image_algebra::over_in_place(&acc, &fg, 1.0);
        }
        Ok(acc)
    }

    /// `Transition` semantics (spec §4.5, §8 invariant 4).
    fn exec_transition(&self, range: TimeRange, time: RationalTime, io: &dyn MediaIo, algebra: &dyn ImageAlgebra) -> ToucanResult<Image> {
        if self.inputs.len() != 2 {
            tracing::error!(node = %self.name, inputs = self.inputs.len(), "Transition node requires exactly 2 inputs");
            return Ok(Image::empty());
        }
        let local = self.local_time(time);
        let a = self.inputs[0].exec(local, io, algebra)?;
        let b = self.inputs[1].exec(local, io, algebra)?;
        let duration = range.duration.value;
        let v = if duration.abs() < f64::EPSILON {
            0.0
        } else {
            ((local.value - range.start.value) / duration).clamp(0.0, 1.0)
        };
        Ok(image_algebra::crossfade_images(&a, &b, v as f32))
    }

    /// `LinearTimeWarp` semantics (spec §4.5, §8 boundary scenario 5).
    fn exec_time_warp(&self, scalar: f64, time: RationalTime, io: &dyn MediaIo, algebra: &dyn ImageAlgebra) -> ToucanResult<Image> {
        let local = self.local_time(time);
        let warped = RationalTime::new((local.value * scalar).floor(), local.rate);
        self.exec_input_at(0, warped, io, algebra)
    }

    fn exec_input_at(&self, index: usize, time: RationalTime, io: &dyn MediaIo, algebra: &dyn ImageAlgebra) -> ToucanResult<Image> {
        match self.inputs.get(index) {
            Some(input) => input.exec(time, io, algebra),
            None => Ok(Image::empty()),
        }
    }

    /// `HostEffect` semantics (spec §4.5, §4.3 "Render action" /
    /// "Failure"): routes input buffers to the plugin host; a render
    /// failure falls back to input 0 unchanged (identity fallback).
    fn exec_host_effect(
        &self,
        host: &Arc<PluginHost>,
        instance: &Arc<Mutex<crate::plugin_host::PluginInstance>>,
        output_spec: ImageSpec,
        time: RationalTime,
        io: &dyn MediaIo,
        algebra: &dyn ImageAlgebra,
    ) -> ToucanResult<Image> {
        let local = self.local_time(time);
        let mut inputs = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            inputs.push(input.exec(local, io, algebra)?);
        }
        let fallback = inputs.first().cloned().unwrap_or_else(Image::empty);
        let mut guard = instance.lock().expect("plugin instance mutex poisoned");
        match host.render(&mut guard, &inputs, output_spec) {
            Ok(img) => Ok(img),
            Err(e) => {
                tracing::error!(node = %self.name, error = %e, "HostEffect render failed, falling back to input 0");
                Ok(fallback)
            }
        }
    }
}

/// Emit a Graphviz `digraph` for the subtree rooted at `root` (spec §4.5
/// "Graph emission"). Each node's vertex id is `name_<identity>`; a node
/// visited through two parents is emitted once per incoming edge —
/// intentional duplication, not a bug, since cycles are impossible by
/// construction (spec §9).
pub fn graph(root: &NodeRef, name: &str) -> Vec<String> {
    let mut lines = vec![format!("digraph {name} {{")];
    emit_node(root, name, &mut lines);
    lines.push("}".to_string());
    lines
}

fn vertex_id(node: &NodeRef, name: &str) -> String {
    format!("{name}_{:p}", Rc::as_ptr(node))
}

fn emit_node(node: &NodeRef, name: &str, lines: &mut Vec<String>) {
    let id = vertex_id(node, name);
    lines.push(format!("  {id} [label=\"{}\"];", node.label()));
    for input in &node.inputs {
        let input_id = vertex_id(input, name);
        lines.push(format!("  {id} -> {input_id};"));
        emit_node(input, name, lines);
    }
}
