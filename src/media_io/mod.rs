//! Still-image, sequence-frame and memory-mapped media readers (spec §4.1).
//!
//! The Graph Builder is generic over [`MediaIo`] so the core never hard-codes
//! a concrete image codec. [`RasterIo`] is the production implementation,
//! backed by the `image` crate for decoding and `memmap2` for the
//! memory-mapped path.

pub mod mmap;

use crate::foundation::error::{ToucanError, ToucanResult};
use crate::image_algebra::{Image, ImageSpec};
use crate::timeline_doc::MediaReference;
use crate::time::RationalTime;

/// Produces an image buffer for a still file, a sequence frame, or a byte
/// slice (spec §4.1 contract).
pub trait MediaIo: Send + Sync {
    /// Decode a whole-file still image. Promotes 3-channel decodes to
    /// 4-channel RGBA with an opaque alpha (spec §4.1).
    fn read_still(&self, path: &str) -> ToucanResult<Image>;

    /// Decode one frame of an image sequence at `time`, converting to a
    /// frame index via `floor(time.value - time_offset.value)` and
    /// resolving the per-frame filename (spec §4.1). `start_frame`/`step`
    /// are accepted to match the media reference's shape but do not
    /// participate in the filename.
    fn read_sequence_frame(
        &self,
        directory: &str,
        name_prefix: &str,
        name_suffix: &str,
        start_frame: i64,
        step: i64,
        zero_padding: usize,
        time: RationalTime,
        time_offset: RationalTime,
    ) -> ToucanResult<Image>;

    /// Decode a still image from a byte slice already resident in memory
    /// (the `Memory` media-reference variant).
    fn read_memory(&self, bytes: &[u8]) -> ToucanResult<Image>;
}

/// Resolve any [`MediaReference`] to an [`Image`] at `time`, dispatching to
/// the matching [`MediaIo`] method (spec §4.6.1 "Leaf" construction).
///
/// Failures never propagate past this call: per spec §4.1 "Failure", I/O
/// errors are logged and the affected node treated as an empty buffer by
/// its caller; this function itself still returns the error so the caller
/// (the image-node `Read`/`SequenceRead` variants) can apply that policy.
pub fn resolve(
    io: &dyn MediaIo,
    media: &MediaReference,
    base_dir: &str,
    time: RationalTime,
    time_offset: RationalTime,
) -> ToucanResult<Image> {
    match media {
        MediaReference::External { url } => {
            let path = resolve_external_path(base_dir, url);
            io.read_still(&path)
        }
        MediaReference::Memory { address, length } => {
            let mapped = mmap::slice_for(*address, *length)
                .ok_or_else(|| ToucanError::not_found(format!("memory reference {address:#x}+{length}")))?;
            io.read_memory(mapped)
        }
        MediaReference::Sequence {
            directory,
            name_prefix,
            name_suffix,
            start_frame,
            step,
            zero_padding,
            ..
        } => io.read_sequence_frame(
            directory,
            name_prefix,
            name_suffix,
            *start_frame,
            *step,
            *zero_padding,
            time,
            time_offset,
        ),
    }
}

/// Resolve an `External` media reference's URL against `base_dir`,
/// honoring the protocol split of spec §6: a URL carrying a protocol is
/// used as-is, a bare path is joined to `base_dir`.
pub fn resolve_external_path(base_dir: &str, url: &str) -> String {
    let (protocol, rest) = crate::file_utils::url::split_protocol(url);
    if !protocol.is_empty() {
        return format!("{protocol}{rest}");
    }
    if base_dir.is_empty() || rest.starts_with('/') {
        return rest;
    }
    format!("{}/{}", base_dir.trim_end_matches('/'), rest)
}

/// Production [`MediaIo`] backed by the `image` crate for decoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct RasterIo;

fn decode_bytes(bytes: &[u8], path_for_errors: &str) -> ToucanResult<Image> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| ToucanError::decode_error(path_for_errors, e.to_string()))?;
    // `to_rgba8` synthesizes an opaque alpha channel for 3-channel sources,
    // matching spec §4.1's explicit promotion rule.
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let spec = ImageSpec::new(width, height);
    Ok(Image { spec, data: rgba.into_raw() })
}

impl MediaIo for RasterIo {
    fn read_still(&self, path: &str) -> ToucanResult<Image> {
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToucanError::not_found(path)
            } else {
                ToucanError::read_failed(path, e.to_string())
            }
        })?;
        decode_bytes(&bytes, path)
    }

    fn read_sequence_frame(
        &self,
        directory: &str,
        name_prefix: &str,
        name_suffix: &str,
        _start_frame: i64,
        _step: i64,
        zero_padding: usize,
        time: RationalTime,
        time_offset: RationalTime,
    ) -> ToucanResult<Image> {
        // `start_frame`/`step` are carried on the media reference (spec §3)
        // but the frame index is the offset time itself; both fields are
        // stored but never folded into the filename.
        let local = time.sub(time_offset);
        let frame = local.to_frames();
        let name = crate::file_utils::sequence::make_frame_name(name_prefix, frame, zero_padding, name_suffix);
        let path = if directory.is_empty() {
            name
        } else {
            format!("{}/{}", directory.trim_end_matches('/'), name)
        };
        self.read_still(&path)
    }

    fn read_memory(&self, bytes: &[u8]) -> ToucanResult<Image> {
        decode_bytes(bytes, "<memory>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_external_path_keeps_protocol_as_is() {
        assert_eq!(resolve_external_path("/base", "file:///tmp/a.png"), "file:///tmp/a.png");
    }

    #[test]
    fn resolve_external_path_joins_bare_path_to_base_dir() {
        assert_eq!(resolve_external_path("/base", "clips/a.png"), "/base/clips/a.png");
    }

    #[test]
    fn resolve_external_path_keeps_absolute_bare_path() {
        assert_eq!(resolve_external_path("/base", "/abs/a.png"), "/abs/a.png");
    }

    #[test]
    fn sequence_frame_name_matches_spec_boundary_scenario_4() {
        // spec §8 row 4: SequenceRead("render.", ".exr", padding=4) at
        // frame 7 over start-frame 1 -> opens render.0007.exr.
        let io = RasterIo;
        let rate = 24.0;
        let t = RationalTime::new(7.0, rate);
        let offset = RationalTime::new(0.0, rate);
        let err = io
            .read_sequence_frame("/does/not/exist", "render.", ".exr", 1, 1, 4, t, offset)
            .unwrap_err();
        assert!(matches!(err, ToucanError::NotFound(_)));
        if let ToucanError::NotFound(msg) = err {
            assert!(msg.ends_with("render.0007.exr"), "{msg}");
        }
    }

    #[test]
    fn read_still_not_found_maps_to_not_found_error() {
        let io = RasterIo;
        let err = io.read_still("/nonexistent/path/xyz.png").unwrap_err();
        assert!(matches!(err, ToucanError::NotFound(_)));
    }
}
