//! The abstract shape of an edit-decision document the core walks (spec §3:
//! "opaque tree...the core uses only this shape"; SPEC_FULL §5).
//!
//! No concrete timeline/OTIO crate is in scope (spec §1 Non-goals): this
//! module defines the trait/struct boundary a host application implements
//! over its own document model.

use crate::time::{RationalTime, TimeRange};
use serde::{Deserialize, Serialize};

/// A document-side effect descriptor: a schema name plus an opaque
/// parameter reader/writer (spec §4.4, §6). Serializable so a host
/// application can persist/exchange effect parameters as JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EffectDescriptor {
    /// Registered schema name (spec §4.4 table, e.g. `"FillEffect"`).
    pub schema_name: String,
    /// Parameters, keyed by the schema's own parameter names.
    pub params: std::collections::BTreeMap<String, ParamValue>,
}

impl EffectDescriptor {
    /// Construct a descriptor with no parameters set.
    pub fn new(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            params: std::collections::BTreeMap::new(),
        }
    }

    /// Builder-style parameter setter.
    pub fn with_param(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// An untyped effect parameter value (spec §4.4 "untyped reader/writer
/// interface").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// Double-precision float.
    Double(f64),
    /// Signed integer.
    Int(i64),
    /// UTF-8 string.
    String(String),
    /// Boolean flag.
    Bool(bool),
    /// `(width, height)`-style pair.
    Size(u32, u32),
    /// RGBA colour in `[0, 1]`.
    Color([f32; 4]),
    /// `(x, y)`-style position.
    Point(f32, f32),
    /// Arbitrary structured data a plugin or document library wants to
    /// round-trip without the core knowing its shape.
    Json(serde_json::Value),
}

/// Read effect parameters by key; missing keys retain the caller's default
/// (spec §4.4: "missing keys on read cause the parameter to retain its
/// default").
pub trait ParamReader {
    /// Read `key`, or `None` if absent.
    fn read(&self, key: &str) -> Option<&ParamValue>;
}

/// Write effect parameters by key (spec §6: "on write, the same keys must
/// round-trip").
pub trait ParamWriter {
    /// Write `value` under `key`.
    fn write(&mut self, key: &str, value: ParamValue);
}

impl ParamReader for EffectDescriptor {
    fn read(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }
}

impl ParamWriter for EffectDescriptor {
    fn write(&mut self, key: &str, value: ParamValue) {
        self.params.insert(key.to_string(), value);
    }
}

/// One of the three media-reference kinds (spec §3 "Media reference").
#[derive(Clone, Debug)]
pub enum MediaReference {
    /// A URL resolved against a base directory.
    External {
        /// The raw URL or path string.
        url: String,
    },
    /// A byte slice into a memory-mapped archive.
    Memory {
        /// Byte offset into the mapping.
        address: usize,
        /// Byte length of the slice.
        length: usize,
    },
    /// A frame-indexed image sequence.
    Sequence {
        /// Directory containing the sequence files.
        directory: String,
        /// Filename prefix before the zero-padded frame number.
        name_prefix: String,
        /// Filename suffix (extension) after the frame number.
        name_suffix: String,
        /// First frame number present on disk.
        start_frame: i64,
        /// Frame-number step between consecutive files.
        step: i64,
        /// Sequence frame rate.
        rate: f64,
        /// Zero-padding width.
        zero_padding: usize,
    },
}

/// A clip: a reference to a media source over a source-time range (spec
/// §3 "Clip").
#[derive(Clone, Debug)]
pub struct Clip {
    /// Stable name, used in graph emission.
    pub name: String,
    /// The media this clip plays.
    pub media: MediaReference,
    /// Range this item occupies in its parent track's time.
    pub trimmed_range_in_parent: TimeRange,
    /// Range of the underlying media this clip plays.
    pub source_range: TimeRange,
    /// Effects applied to this clip, closest-to-leaf first (spec §4.6.1).
    pub effects: Vec<EffectDescriptor>,
}

/// A gap: a timeline item contributing nothing to the output (spec §3).
#[derive(Clone, Debug)]
pub struct Gap {
    /// Range this gap occupies in its parent track's time.
    pub trimmed_range_in_parent: TimeRange,
}

/// A transition between the clip ending at this item and the clip starting
/// after it (spec §3, §4.6.2).
#[derive(Clone, Debug)]
pub struct TransitionItem {
    /// The time range (in the containing track's time) over which the
    /// transition blends.
    pub range_in_parent: TimeRange,
}

/// A nested stack (sub-timeline) item. Not traversed by the core's
/// top-level builder beyond its own `trimmed_range_in_parent`; full nested
/// composition is a caller concern (spec §3 lists it only as a shape).
#[derive(Clone, Debug)]
pub struct NestedStack {
    /// Range this stack occupies in its parent track's time.
    pub trimmed_range_in_parent: TimeRange,
    /// The nested stack's own tracks.
    pub tracks: Vec<Track>,
}

/// One timeline item: a clip, gap, transition, or nested stack (spec §3).
#[derive(Clone, Debug)]
pub enum Item {
    /// See [`Clip`].
    Clip(Clip),
    /// See [`Gap`].
    Gap(Gap),
    /// See [`TransitionItem`].
    Transition(TransitionItem),
    /// See [`NestedStack`].
    Stack(NestedStack),
}

impl Item {
    /// This item's range within its parent track's time, common to every
    /// variant.
    pub fn trimmed_range_in_parent(&self) -> TimeRange {
        match self {
            Item::Clip(c) => c.trimmed_range_in_parent,
            Item::Gap(g) => g.trimmed_range_in_parent,
            Item::Transition(t) => t.range_in_parent,
            Item::Stack(s) => s.trimmed_range_in_parent,
        }
    }
}

/// Whether a track carries video (composited) or another kind of item the
/// core skips (spec §4.6 step 2: "For each track of *video* kind").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackKind {
    /// Composited by the Graph Builder.
    Video,
    /// Ignored by the image-node builder (e.g. audio; spec §1 Non-goals).
    Audio,
}

/// An affine mapping from a track's parent (timeline) time into the
/// track's own local time (spec §4.6 step 2a). Linear and invertible.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeTransform {
    /// Additive offset, in the *parent's* rate, applied before rescaling.
    pub offset: RationalTime,
}

impl TimeTransform {
    /// The identity transform: track-local time equals parent time.
    pub fn identity(rate: f64) -> Self {
        Self {
            offset: RationalTime::new(0.0, rate),
        }
    }

    /// Map a parent-time value into track-local time.
    pub fn to_local(self, parent_time: RationalTime) -> RationalTime {
        parent_time.sub(self.offset)
    }
}

/// A horizontal lane of items composited bottom-to-top onto the stacking
/// accumulator (spec §3 "Track").
#[derive(Clone, Debug)]
pub struct Track {
    /// Stable name, used in graph emission.
    pub name: String,
    /// Video vs. other kinds (only video kinds are composited, §4.6).
    pub kind: TrackKind,
    /// Items in parent-time order.
    pub items: Vec<Item>,
    /// Effects applied after this track's item contribution (spec §4.6.3).
    pub effects: Vec<EffectDescriptor>,
    /// Parent (timeline) time to track-local time mapping (spec §4.6 2a).
    pub time_transform: TimeTransform,
}

impl Track {
    /// Binary-search `items` (assumed sorted by `trimmed_range_in_parent`)
    /// for the item containing track-local time `t` (spec §4.6.2
    /// complexity note: "range lookup by binary search on sorted
    /// children").
    pub fn item_at(&self, t: RationalTime) -> Option<(usize, &Item)> {
        let idx = self
            .items
            .partition_point(|item| item.trimmed_range_in_parent().start.value <= t.value)
            .checked_sub(1)?;
        let item = self.items.get(idx)?;
        if item.trimmed_range_in_parent().contains(t) {
            Some((idx, item))
        } else {
            None
        }
    }
}

/// The top-level timeline document the Graph Builder walks (spec §3
/// "Timeline document").
pub trait TimelineDocument: Send + Sync {
    /// The timeline's global start time, or `None` to default to `(0,
    /// rate)` (spec §4.6 step 1).
    fn global_start_time(&self) -> Option<RationalTime>;
    /// Tracks, bottom-to-top (index 0 is the bottommost track).
    fn tracks(&self) -> &[Track];
}

/// A ready-made in-memory [`TimelineDocument`] implementation, the shape a
/// host application (or a test fixture) can build directly without its own
/// document crate.
#[derive(Clone, Debug, Default)]
pub struct InMemoryTimeline {
    /// See [`TimelineDocument::global_start_time`].
    pub global_start_time: Option<RationalTime>,
    /// Tracks bottom-to-top.
    pub tracks: Vec<Track>,
}

impl TimelineDocument for InMemoryTimeline {
    fn global_start_time(&self) -> Option<RationalTime> {
        self.global_start_time
    }

    fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}

/// Find the clip immediately preceding `idx` in `items`, if any (spec
/// §4.6.2 "detect the two adjacent clips").
pub fn preceding_clip(items: &[Item], idx: usize) -> Option<&Clip> {
    items[..idx].iter().rev().find_map(|item| match item {
        Item::Clip(c) => Some(c),
        _ => None,
    })
}

/// Find the clip immediately following `idx` in `items`, if any (spec
/// §4.6.2 "detect the two adjacent clips").
pub fn following_clip(items: &[Item], idx: usize) -> Option<&Clip> {
    items[idx + 1..].iter().find_map(|item| match item {
        Item::Clip(c) => Some(c),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rt(v: f64, r: f64) -> RationalTime {
        RationalTime::new(v, r)
    }

    #[test]
    fn effect_descriptor_round_trips_through_json() {
        let original = EffectDescriptor::new("SaturateEffect")
            .with_param("value", ParamValue::Double(0.5))
            .with_param("label", ParamValue::String("desat".into()))
            .with_param("extra", ParamValue::Json(serde_json::json!({"vendor": "acme", "tag": 3})));
        let text = serde_json::to_string(&original).unwrap();
        let round_tripped: EffectDescriptor = serde_json::from_str(&text).unwrap();
        assert_eq!(round_tripped.schema_name, original.schema_name);
        assert_eq!(round_tripped.params, original.params);
    }

    fn gap(start: f64, dur: f64) -> Item {
        Item::Gap(Gap {
            trimmed_range_in_parent: TimeRange::new(rt(start, 24.0), rt(dur, 24.0)).unwrap(),
        })
    }

    #[test]
    fn item_at_finds_containing_item() {
        let items = vec![gap(0.0, 10.0), gap(10.0, 10.0), gap(20.0, 10.0)];
        let track = Track {
            name: "v1".into(),
            kind: TrackKind::Video,
            items,
            effects: vec![],
            time_transform: TimeTransform::identity(24.0),
        };
        assert!(matches!(track.item_at(rt(15.0, 24.0)), Some((1, _))));
        assert!(matches!(track.item_at(rt(0.0, 24.0)), Some((0, _))));
        assert!(track.item_at(rt(30.0, 24.0)).is_none());
    }

    #[test]
    fn preceding_and_following_clip_skip_non_clips() {
        let clip_a = Item::Clip(Clip {
            name: "a".into(),
            media: MediaReference::External { url: "a.png".into() },
            trimmed_range_in_parent: TimeRange::new(rt(0.0, 24.0), rt(10.0, 24.0)).unwrap(),
            source_range: TimeRange::new(rt(0.0, 24.0), rt(10.0, 24.0)).unwrap(),
            effects: vec![],
        });
        let clip_b = Item::Clip(Clip {
            name: "b".into(),
            media: MediaReference::External { url: "b.png".into() },
            trimmed_range_in_parent: TimeRange::new(rt(10.0, 24.0), rt(10.0, 24.0)).unwrap(),
            source_range: TimeRange::new(rt(0.0, 24.0), rt(10.0, 24.0)).unwrap(),
            effects: vec![],
        });
        let items = vec![clip_a, gap(10.0, 0.0), clip_b];
        assert!(preceding_clip(&items, 1).is_some());
        assert!(following_clip(&items, 1).is_some());
        assert!(preceding_clip(&items, 0).is_none());
        assert!(following_clip(&items, 2).is_none());
    }
}
