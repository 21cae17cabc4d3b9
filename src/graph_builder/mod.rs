//! Walks a [`TimelineDocument`] at a timeline time and assembles the
//! per-frame image-node DAG (spec §4.6, §4.6.1-§4.6.3).

use crate::effect_registry::EffectRegistry;
use crate::image_node::{ImageNode, NodeRef, NodeVariant};
use crate::time::RationalTime;
use crate::timeline_doc::{following_clip, preceding_clip, Clip, EffectDescriptor, Item, MediaReference, Track, TrackKind};
use std::rc::Rc;

/// Builder-wide options.
#[derive(Clone, Debug)]
pub struct GraphBuilderOptions {
    /// Base directory `External` media references resolve against.
    pub base_dir: String,
    /// Fallback rate used when the document has no global start time.
    pub default_rate: f64,
}

impl Default for GraphBuilderOptions {
    fn default() -> Self {
        Self {
            base_dir: String::new(),
            default_rate: 24.0,
        }
    }
}

/// Assembles the per-frame image-node DAG from a [`TimelineDocument`] (spec
/// §4.6).
///
/// `build_frame` is a pure function of `(document, time, registry)`: it is
/// `Send + Sync` over `&dyn TimelineDocument` + `&EffectRegistry`, so a
/// caller may fan frames out across a `rayon` thread pool without any
/// synchronization beyond that bound (spec §5).
#[derive(Clone, Debug, Default)]
pub struct GraphBuilder {
    options: GraphBuilderOptions,
}

impl GraphBuilder {
    /// Construct a builder with `options`.
    pub fn new(options: GraphBuilderOptions) -> Self {
        Self { options }
    }

    /// The timeline's global start time, defaulting to `(0, rate)` when the
    /// document leaves it unset (spec §4.6 step 1). This bounds the frame
    /// range an external render loop iterates (SPEC_FULL §3: "the render
    /// loop iterates `start..=end_time_inclusive`"); item lookup inside
    /// [`GraphBuilder::build_frame`] itself operates directly on the
    /// absolute timeline time passed in, since `trimmed_range_in_parent`
    /// values are already expressed in that same absolute coordinate space.
    pub fn global_start_time(&self, document: &dyn crate::timeline_doc::TimelineDocument) -> RationalTime {
        document
            .global_start_time()
            .unwrap_or_else(|| RationalTime::new(0.0, self.options.default_rate))
    }

    /// Build the root node of the DAG that yields the frame at `time`
    /// (timeline time), per the traversal algorithm in spec §4.6.
    pub fn build_frame(&self, document: &dyn crate::timeline_doc::TimelineDocument, registry: &EffectRegistry, time: RationalTime) -> NodeRef {
        let mut acc: Option<NodeRef> = None;

        // Step 2: compose tracks bottom-to-top (index 0 is bottommost).
        for track in document.tracks() {
            if track.kind != TrackKind::Video {
                continue;
            }
            let Some(contribution) = self.build_track_contribution(track, time, registry) else {
                continue;
            };
            let contribution = apply_effect_chain(contribution, &track.effects, registry);
            acc = Some(match acc {
                None => contribution,
                Some(below) => ImageNode::with_inputs("composite", vec![contribution, below], NodeVariant::Composite { premult: true }),
            });
        }

        acc.unwrap_or_else(|| ImageNode::with_inputs("empty", vec![], NodeVariant::Composite { premult: true }))
    }

    /// Track-local contribution at `time` (step 2a-2e), or `None` if the
    /// track has no active item at this time (step 2b "If none, skip").
    fn build_track_contribution(&self, track: &Track, time: RationalTime, registry: &EffectRegistry) -> Option<NodeRef> {
        let local_time = track.time_transform.to_local(time);
        let (idx, item) = track.item_at(local_time)?;
        match item {
            Item::Clip(clip) => Some(self.build_clip_subgraph(clip, registry)),
            Item::Gap(_) => None,
            Item::Transition(transition) => {
                let before = preceding_clip(&track.items, idx)?;
                let after = following_clip(&track.items, idx)?;
                let a = self.build_clip_subgraph(before, registry);
                let b = self.build_clip_subgraph(after, registry);
                Some(ImageNode::with_inputs(
                    "transition",
                    vec![a, b],
                    NodeVariant::Transition { range: transition.range_in_parent },
                ))
            }
            // Full nested-stack composition is a caller concern beyond the
            // stack's own time range (spec §3 lists it only as a shape);
            // the core contributes nothing for it at this level.
            Item::Stack(_) => None,
        }
    }

    /// Build the clip subgraph (spec §4.6.1): a leaf wrapped in a
    /// source-local time offset, then the clip's effect chain applied in
    /// document order.
    fn build_clip_subgraph(&self, clip: &Clip, registry: &EffectRegistry) -> NodeRef {
        // t_src = t_track - item.trimmed_start + item.source_start, folded
        // into the leaf's time_offset so the leaf's local t=0 corresponds
        // to the clip's source-local start (spec §4.6.1, invariant 2).
        let offset = clip.trimmed_range_in_parent.start.sub(clip.source_range.start);
        let variant = match &clip.media {
            MediaReference::Sequence { .. } => NodeVariant::SequenceRead {
                media: clip.media.clone(),
                base_dir: self.options.base_dir.clone(),
            },
            MediaReference::External { .. } | MediaReference::Memory { .. } => NodeVariant::Read {
                media: clip.media.clone(),
                base_dir: self.options.base_dir.clone(),
            },
        };
        let leaf = Rc::new(ImageNode {
            name: clip.name.clone(),
            inputs: Vec::new(),
            time_offset: offset,
            variant,
        });
        apply_effect_chain(leaf, &clip.effects, registry)
    }
}

/// Apply `effects` in document order as a chain of unary nodes, each node's
/// sole input the previous stage (spec §4.6.3: "first effect is closest to
/// the leaf"). A `LinearTimeWarp` effect is reordered below every other
/// effect so it mutates time before downstream filters re-enter the leaf
/// (spec §4.6.3).
fn apply_effect_chain(leaf: NodeRef, effects: &[EffectDescriptor], registry: &EffectRegistry) -> NodeRef {
    let (time_warps, rest): (Vec<_>, Vec<_>) = effects.iter().partition(|e| e.schema_name == "LinearTimeWarpEffect");

    let mut node = leaf;
    for effect in time_warps.into_iter().chain(rest) {
        node = make_or_skip(node, effect, registry);
    }
    node
}

fn make_or_skip(input: NodeRef, effect: &EffectDescriptor, registry: &EffectRegistry) -> NodeRef {
    match registry.make(effect, vec![Rc::clone(&input)]) {
        Ok(node) => node,
        Err(e) => {
            tracing::warn!(schema = %effect.schema_name, error = %e, "unknown effect schema, skipping");
            input
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_algebra::CpuImageAlgebra;
    use crate::media_io::RasterIo;
    use crate::time::TimeRange;
    use crate::timeline_doc::{Gap, InMemoryTimeline, ParamValue, TimeTransform};

    fn rt(v: f64, r: f64) -> RationalTime {
        RationalTime::new(v, r)
    }

    fn fill_effect(color: [f32; 4]) -> EffectDescriptor {
        EffectDescriptor::new("FillEffect")
            .with_param("size", ParamValue::Size(1, 1))
            .with_param("color", ParamValue::Color(color))
    }

    fn clip_with_effect(name: &str, start: f64, dur: f64, color: [f32; 4]) -> Item {
        Item::Clip(Clip {
            name: name.to_string(),
            media: MediaReference::External { url: format!("{name}.png") },
            trimmed_range_in_parent: TimeRange::new(rt(start, 24.0), rt(dur, 24.0)).unwrap(),
            source_range: TimeRange::new(rt(0.0, 24.0), rt(dur, 24.0)).unwrap(),
            effects: vec![fill_effect(color)],
        })
    }

    fn video_track(name: &str, items: Vec<Item>) -> Track {
        Track {
            name: name.to_string(),
            kind: TrackKind::Video,
            items,
            effects: vec![],
            time_transform: TimeTransform::identity(24.0),
        }
    }

    #[test]
    fn two_track_composite_order_matches_spec_boundary_scenario_1() {
        // spec §8 boundary scenario 1: an opaque red clip on the bottom
        // track, an opaque blue clip on the top track -> the top track's
        // contribution wins the composite (input 0 is foreground).
        let bottom = video_track("v0", vec![clip_with_effect("red", 0.0, 24.0, [1.0, 0.0, 0.0, 1.0])]);
        let top = video_track("v1", vec![clip_with_effect("blue", 0.0, 24.0, [0.0, 0.0, 1.0, 1.0])]);
        let doc = InMemoryTimeline {
            global_start_time: None,
            tracks: vec![bottom, top],
        };
        let registry = EffectRegistry::with_builtins();
        let builder = GraphBuilder::default();
        let root = builder.build_frame(&doc, &registry, rt(0.0, 24.0));
        let io = RasterIo;
        let algebra = CpuImageAlgebra;
        let img = root.exec(rt(0.0, 24.0), &io, &algebra).unwrap();
        assert_eq!(&img.data[0..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn gap_track_is_skipped_not_fatal() {
        let gap_track = video_track(
            "v0",
            vec![Item::Gap(Gap {
                trimmed_range_in_parent: TimeRange::new(rt(0.0, 24.0), rt(24.0, 24.0)).unwrap(),
            })],
        );
        let color_track = video_track("v1", vec![clip_with_effect("solid", 0.0, 24.0, [0.2, 0.4, 0.6, 1.0])]);
        let doc = InMemoryTimeline {
            global_start_time: None,
            tracks: vec![gap_track, color_track],
        };
        let registry = EffectRegistry::with_builtins();
        let builder = GraphBuilder::default();
        let root = builder.build_frame(&doc, &registry, rt(0.0, 24.0));
        let io = RasterIo;
        let algebra = CpuImageAlgebra;
        let img = root.exec(rt(0.0, 24.0), &io, &algebra).unwrap();
        assert!(!img.is_empty());
    }

    #[test]
    fn three_tracks_nest_bottom_to_top() {
        let v0 = video_track("v0", vec![clip_with_effect("a", 0.0, 24.0, [1.0, 0.0, 0.0, 1.0])]);
        let v1 = video_track("v1", vec![clip_with_effect("b", 0.0, 24.0, [0.0, 1.0, 0.0, 1.0])]);
        let v2 = video_track("v2", vec![clip_with_effect("c", 0.0, 24.0, [0.0, 0.0, 1.0, 1.0])]);
        let doc = InMemoryTimeline {
            global_start_time: None,
            tracks: vec![v0, v1, v2],
        };
        let registry = EffectRegistry::with_builtins();
        let builder = GraphBuilder::default();
        let root = builder.build_frame(&doc, &registry, rt(0.0, 24.0));
        // Topmost opaque clip (v2, blue) wins the composite.
        let io = RasterIo;
        let algebra = CpuImageAlgebra;
        let img = root.exec(rt(0.0, 24.0), &io, &algebra).unwrap();
        assert_eq!(&img.data[0..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn unknown_effect_schema_is_skipped_with_identity() {
        let mut clip = match clip_with_effect("a", 0.0, 24.0, [1.0, 1.0, 1.0, 1.0]) {
            Item::Clip(c) => c,
            _ => unreachable!(),
        };
        clip.effects.push(EffectDescriptor::new("NotRegisteredEffect"));
        let track = video_track("v0", vec![Item::Clip(clip)]);
        let doc = InMemoryTimeline {
            global_start_time: None,
            tracks: vec![track],
        };
        let registry = EffectRegistry::with_builtins();
        let builder = GraphBuilder::default();
        let root = builder.build_frame(&doc, &registry, rt(0.0, 24.0));
        let io = RasterIo;
        let algebra = CpuImageAlgebra;
        let img = root.exec(rt(0.0, 24.0), &io, &algebra).unwrap();
        assert_eq!(&img.data[0..4], &[255, 255, 255, 255]);
    }

    #[test]
    fn global_start_time_defaults_to_zero_at_default_rate() {
        let doc = InMemoryTimeline {
            global_start_time: None,
            tracks: vec![],
        };
        let builder = GraphBuilder::default();
        let start = builder.global_start_time(&doc);
        assert_eq!(start.value, 0.0);
        assert_eq!(start.rate, 24.0);
    }

    #[test]
    fn clip_placed_after_global_start_reads_its_own_source_local_time() {
        // A clip spanning source frames [0,24) placed at absolute parent
        // time [100,124); evaluated at timeline frame 100 it should read
        // source-local time 0 (spec §8 invariant 2).
        let track = video_track("v0", vec![clip_with_effect("shifted", 100.0, 24.0, [0.1, 0.2, 0.3, 1.0])]);
        let doc = InMemoryTimeline {
            global_start_time: Some(rt(100.0, 24.0)),
            tracks: vec![track],
        };
        let registry = EffectRegistry::with_builtins();
        let builder = GraphBuilder::default();
        let root = builder.build_frame(&doc, &registry, rt(100.0, 24.0));
        let io = RasterIo;
        let algebra = CpuImageAlgebra;
        let img = root.exec(rt(100.0, 24.0), &io, &algebra).unwrap();
        assert!(!img.is_empty());
    }
}
