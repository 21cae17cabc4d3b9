//! Translates document-side effect descriptors into image-node factories
//! (spec §4.4).

use crate::foundation::error::{ToucanError, ToucanResult};
use crate::image_algebra::{FilterKind, ImageSpec, NoiseKind};
use crate::image_node::{ImageNode, NodeRef, NodeVariant};
use crate::plugin_host::PluginHost;
use crate::timeline_doc::{EffectDescriptor, ParamReader, ParamValue};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A factory turning an [`EffectDescriptor`] plus its input nodes into an
/// image node (spec §4.4 "node factories").
pub type NodeFactory = Arc<dyn Fn(&EffectDescriptor, Vec<NodeRef>) -> ToucanResult<NodeRef> + Send + Sync>;

/// Maps document-side effect schema names to node factories (spec §4.4).
#[derive(Clone)]
pub struct EffectRegistry {
    factories: BTreeMap<String, NodeFactory>,
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn read_double(params: &dyn ParamReader, key: &str, default: f64) -> f64 {
    match params.read(key) {
        Some(ParamValue::Double(v)) => *v,
        Some(ParamValue::Int(v)) => *v as f64,
        _ => default,
    }
}

fn read_size(params: &dyn ParamReader, key: &str, default: (u32, u32)) -> ImageSpec {
    match params.read(key) {
        Some(ParamValue::Size(w, h)) => ImageSpec::new(*w, *h),
        _ => ImageSpec::new(default.0, default.1),
    }
}

fn read_color(params: &dyn ParamReader, key: &str, default: [f32; 4]) -> [f32; 4] {
    match params.read(key) {
        Some(ParamValue::Color(c)) => *c,
        _ => default,
    }
}

fn read_string(params: &dyn ParamReader, key: &str, default: &str) -> String {
    match params.read(key) {
        Some(ParamValue::String(s)) => s.clone(),
        _ => default.to_string(),
    }
}

fn read_bool(params: &dyn ParamReader, key: &str, default: bool) -> bool {
    match params.read(key) {
        Some(ParamValue::Bool(b)) => *b,
        _ => default,
    }
}

fn read_point(params: &dyn ParamReader, key: &str, default: (f32, f32)) -> (f32, f32) {
    match params.read(key) {
        Some(ParamValue::Point(x, y)) => (*x, *y),
        _ => default,
    }
}

impl EffectRegistry {
    /// An empty registry with no schemas registered.
    pub fn new() -> Self {
        Self { factories: BTreeMap::new() }
    }

    /// Register `factory` under `schema_name`, overwriting any prior
    /// registration for the same name (spec §4.4 `register`).
    pub fn register(&mut self, schema_name: impl Into<String>, factory: NodeFactory) {
        self.factories.insert(schema_name.into(), factory);
    }

    /// Build a node for `descriptor` over `inputs`. Unknown schemas log at
    /// warning and are skipped by the caller (spec §4.6.3); this method
    /// itself reports [`ToucanError::UnknownSchema`] so the caller can
    /// decide (the Graph Builder treats it as "skip with a warning").
    pub fn make(&self, descriptor: &EffectDescriptor, inputs: Vec<NodeRef>) -> ToucanResult<NodeRef> {
        let factory = self
            .factories
            .get(&descriptor.schema_name)
            .ok_or_else(|| ToucanError::unknown_schema(descriptor.schema_name.clone()))?;
        factory(descriptor, inputs)
    }

    /// A registry with every built-in schema from spec §4.4's table
    /// registered as a node factory.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(
            "FillEffect",
            Arc::new(|d, _inputs| {
                Ok(ImageNode::leaf(
                    "fill",
                    NodeVariant::Fill {
                        size: read_size(d, "size", (1920, 1080)),
                        color: read_color(d, "color", [0.0, 0.0, 0.0, 1.0]),
                    },
                ))
            }),
        );

        registry.register(
            "CheckersEffect",
            Arc::new(|d, _inputs| {
                let checker_size = read_size(d, "checker_size", (32, 32));
                Ok(ImageNode::leaf(
                    "checkers",
                    NodeVariant::Checkers {
                        size: read_size(d, "size", (1920, 1080)),
                        checker_size: (checker_size.width, checker_size.height),
                        color1: read_color(d, "color1", [0.0, 0.0, 0.0, 1.0]),
                        color2: read_color(d, "color2", [1.0, 1.0, 1.0, 1.0]),
                    },
                ))
            }),
        );

        registry.register(
            "NoiseEffect",
            Arc::new(|d, _inputs| {
                let kind = match read_string(d, "type", "gaussian").as_str() {
                    "uniform" => NoiseKind::Uniform,
                    _ => NoiseKind::Gaussian,
                };
                Ok(ImageNode::leaf(
                    "noise",
                    NodeVariant::Noise {
                        size: read_size(d, "size", (1920, 1080)),
                        kind,
                        a: read_double(d, "a", 0.0),
                        b: read_double(d, "b", 1.0),
                        mono: read_bool(d, "mono", false),
                        seed: read_double(d, "seed", 0.0) as u64,
                    },
                ))
            }),
        );

        registry.register(
            "TextEffect",
            Arc::new(|d, _inputs| {
                Ok(ImageNode::leaf(
                    "text",
                    NodeVariant::Text {
                        size: read_size(d, "size", (1920, 1080)),
                        pos: read_point(d, "pos", (0.0, 0.0)),
                        text: read_string(d, "text", ""),
                        font_size: read_double(d, "font_size", 24.0) as f32,
                        font_name: read_string(d, "font_name", "sans"),
                        color: read_color(d, "color", [1.0, 1.0, 1.0, 1.0]),
                    },
                ))
            }),
        );

        registry.register(
            "ColorMapEffect",
            Arc::new(|d, inputs| {
                Ok(ImageNode::with_inputs(
                    "color_map",
                    inputs,
                    NodeVariant::ColorMap { map_name: read_string(d, "map_name", "identity") },
                ))
            }),
        );

        registry.register("PremultEffect", Arc::new(|_d, inputs| Ok(ImageNode::with_inputs("premult", inputs, NodeVariant::Premult))));
        registry.register(
            "UnpremultEffect",
            Arc::new(|_d, inputs| Ok(ImageNode::with_inputs("unpremult", inputs, NodeVariant::Unpremult))),
        );
        registry.register("InvertEffect", Arc::new(|_d, inputs| Ok(ImageNode::with_inputs("invert", inputs, NodeVariant::Invert))));
        registry.register("FlipEffect", Arc::new(|_d, inputs| Ok(ImageNode::with_inputs("flip", inputs, NodeVariant::Flip))));
        registry.register("FlopEffect", Arc::new(|_d, inputs| Ok(ImageNode::with_inputs("flop", inputs, NodeVariant::Flop))));

        registry.register(
            "PowEffect",
            Arc::new(|d, inputs| Ok(ImageNode::with_inputs("pow", inputs, NodeVariant::Pow { value: read_double(d, "value", 1.0) }))),
        );

        registry.register(
            "SaturateEffect",
            Arc::new(|d, inputs| Ok(ImageNode::with_inputs("saturate", inputs, NodeVariant::Saturate { value: read_double(d, "value", 1.0) }))),
        );

        registry.register(
            "ResizeEffect",
            Arc::new(|d, inputs| {
                Ok(ImageNode::with_inputs(
                    "resize",
                    inputs,
                    NodeVariant::Resize {
                        size: read_size(d, "size", (1920, 1080)),
                        filter: filter_from_name(&read_string(d, "filter_name", "linear")),
                    },
                ))
            }),
        );

        registry.register(
            "RotateEffect",
            Arc::new(|d, inputs| {
                Ok(ImageNode::with_inputs(
                    "rotate",
                    inputs,
                    NodeVariant::Rotate {
                        angle_degrees: read_double(d, "angle", 0.0),
                        filter: filter_from_name(&read_string(d, "filter_name", "linear")),
                    },
                ))
            }),
        );

        registry.register(
            "LinearTimeWarpEffect",
            Arc::new(|d, inputs| {
                Ok(ImageNode::with_inputs(
                    "time_warp",
                    inputs,
                    NodeVariant::LinearTimeWarp { scalar: read_double(d, "time_scalar", 1.0) },
                ))
            }),
        );

        registry
    }

    /// Register the `HostEffect` schema, wired to `host`. Kept separate
    /// from [`EffectRegistry::with_builtins`] because it needs a
    /// process-lifetime [`PluginHost`] to create instances against (spec
    /// §4.4 `HostEffect` row: "metadata forwarded to the plugin
    /// instance").
    pub fn register_host_effects(&mut self, host: Arc<PluginHost>) {
        self.register(
            "HostEffect",
            Arc::new(move |d, inputs| {
                let plugin_id = read_string(d, "plugin_id", "");
                // Already-loaded/described is not fatal; only a missing
                // instance below fails node construction.
                let _ = host.load(&plugin_id);
                let _ = host.describe(&plugin_id);
                let instance = host
                    .create_instance(&plugin_id)
                    .map_err(|_| ToucanError::not_found(format!("plugin instance for {plugin_id}")))?;
                let output_spec = read_size(d, "size", (1920, 1080));
                Ok(ImageNode::with_inputs(
                    "host_effect",
                    inputs,
                    NodeVariant::HostEffect {
                        plugin_id,
                        host: Arc::clone(&host),
                        instance: Arc::new(std::sync::Mutex::new(instance)),
                        output_spec,
                    },
                ))
            }),
        );
    }
}

fn filter_from_name(name: &str) -> FilterKind {
    match name {
        "nearest" => FilterKind::Nearest,
        "cubic" => FilterKind::Cubic,
        _ => FilterKind::Linear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_algebra::CpuImageAlgebra;
    use crate::media_io::RasterIo;
    use crate::time::RationalTime;

    #[test]
    fn make_dispatches_to_registered_schema() {
        let registry = EffectRegistry::with_builtins();
        let descriptor = EffectDescriptor::new("FillEffect")
            .with_param("size", ParamValue::Size(2, 2))
            .with_param("color", ParamValue::Color([0.0, 1.0, 0.0, 1.0]));
        let node = registry.make(&descriptor, vec![]).unwrap();
        let io = RasterIo;
        let algebra = CpuImageAlgebra;
        let img = node.exec(RationalTime::new(0.0, 24.0), &io, &algebra).unwrap();
        assert_eq!(&img.data[0..4], &[0, 255, 0, 255]);
    }

    #[test]
    fn make_reports_unknown_schema() {
        let registry = EffectRegistry::with_builtins();
        let descriptor = EffectDescriptor::new("NotARealSchema");
        let err = registry.make(&descriptor, vec![]).unwrap_err();
        assert!(matches!(err, ToucanError::UnknownSchema(_)));
    }

    #[test]
    fn missing_param_retains_default() {
        let registry = EffectRegistry::with_builtins();
        let descriptor = EffectDescriptor::new("PowEffect"); // no "value" param
        let leaf = ImageNode::leaf(
            "white",
            NodeVariant::Fill {
                size: ImageSpec::new(1, 1),
                color: [1.0, 1.0, 1.0, 1.0],
            },
        );
        let node = registry.make(&descriptor, vec![leaf]).unwrap();
        let io = RasterIo;
        let algebra = CpuImageAlgebra;
        let img = node.exec(RationalTime::new(0.0, 24.0), &io, &algebra).unwrap();
        // value defaults to 1.0 -> identity pow on a white pixel.
        assert_eq!(&img.data[0..4], &[255, 255, 255, 255]);
    }

    #[test]
    fn register_overwrites_prior_factory() {
        let mut registry = EffectRegistry::new();
        registry.register(
            "FillEffect",
            Arc::new(|_d, _inputs| {
                Ok(ImageNode::leaf(
                    "first",
                    NodeVariant::Fill {
                        size: ImageSpec::new(1, 1),
                        color: [1.0, 0.0, 0.0, 1.0],
                    },
                ))
            }),
        );
        registry.register(
            "FillEffect",
            Arc::new(|_d, _inputs| {
                Ok(ImageNode::leaf(
                    "second",
                    NodeVariant::Fill {
                        size: ImageSpec::new(1, 1),
                        color: [0.0, 0.0, 1.0, 1.0],
                    },
                ))
            }),
        );
        let node = registry.make(&EffectDescriptor::new("FillEffect"), vec![]).unwrap();
        assert_eq!(node.name, "second");
    }
}
