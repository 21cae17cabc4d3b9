//! Pixel buffers and the image-algebra collaborator the image-node graph
//! calls into (spec §1 "the core *calls* those primitives", §9 Non-goals).
//!
//! The numerically-specified operations (`over`, `crossfade`, `premult`,
//! `unpremult`, `invert`) are implemented directly here as fixed-point
//! pixel math. Everything else a node variant needs (fill, checkers,
//! noise, gradient, text, colour-map, pow, saturate, flip, flop, rotate,
//! resize) is a method on the injected [`ImageAlgebra`] trait, whose
//! production implementor is backed by the `image` crate.

use crate::foundation::math::mul_div255_u8;
use serde::{Deserialize, Serialize};

/// Width/height of an image to synthesize or resize to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageSpec {
    /// Construct a spec.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// An RGBA8, straight-alpha-or-premultiplied (caller-tracked) pixel buffer,
/// row-major, 4 bytes per pixel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Image {
    /// Image dimensions. `0x0` is the legal "empty" image (spec §4.5:
    /// "An empty buffer is a legal zero result").
    pub spec: ImageSpec,
    /// `width * height * 4` bytes, row-major RGBA.
    pub data: Vec<u8>,
}

impl Image {
    /// A zero-sized empty image.
    pub fn empty() -> Self {
        Self {
            spec: ImageSpec::new(0, 0),
            data: Vec::new(),
        }
    }

    /// `true` iff this image carries no pixels.
    pub fn is_empty(&self) -> bool {
        self.spec.width == 0 || self.spec.height == 0 || self.data.is_empty()
    }

    /// Allocate a zero-filled (transparent black) image of `spec`.
    pub fn blank(spec: ImageSpec) -> Self {
        let len = spec.width as usize * spec.height as usize * 4;
        Self {
            spec,
            data: vec![0u8; len],
        }
    }

    /// Promote a decoded 3-channel (RGB) buffer to 4-channel RGBA with an
    /// opaque alpha channel, per spec §4.1.
    pub fn promote_rgb_to_rgba(spec: ImageSpec, rgb: &[u8]) -> Self {
        let mut data = Vec::with_capacity(spec.width as usize * spec.height as usize * 4);
        for px in rgb.chunks_exact(3) {
            data.extend_from_slice(px);
            data.push(255);
        }
        Self { spec, data }
    }
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

/// Alpha-composite `src` *over* `dst` at premultiplied opacity `opacity`
/// (spec §4.5 Composite: `over(fg, over(mid, ..., bg))`).
pub fn over(dst: [u8; 4], src: [u8; 4], opacity: f32) -> [u8; 4] {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }
    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255_u8(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }
    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255_u8(u16::from(dst[3]), inv));
    for i in 0..3 {
        let sc = mul_div255_u8(u16::from(src[i]), op);
        let dc = mul_div255_u8(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

/// Linear crossfade between `a` and `b` at normalized progress `t` (spec
/// §4.5 Transition: `a*(1-v) + b*v` componentwise).
pub fn crossfade(a: [u8; 4], b: [u8; 4], t: f32) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    let tt = ((t * 255.0).round() as i32).clamp(0, 255) as u16;
    let it = 255u16 - tt;
    let mut out = [0u8; 4];
    for i in 0..4 {
        let av = mul_div255_u8(u16::from(a[i]), it);
        let bv = mul_div255_u8(u16::from(b[i]), tt);
        out[i] = add_sat_u8(av, bv);
    }
    out
}

/// Composite `src` over `dst` in place, pixel-by-pixel. Buffers must share
/// `spec`.
pub fn over_in_place(dst: &Image, src: &Image, opacity: f32) -> Image {
    if dst.is_empty() {
        return src.clone();
    }
    if src.is_empty() {
        return dst.clone();
    }
    let mut out = dst.clone();
    for (d, s) in out.data.chunks_exact_mut(4).zip(src.data.chunks_exact(4)) {
        let blended = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
        d.copy_from_slice(&blended);
    }
    out
}

/// Crossfade `a` and `b` into a fresh image at progress `t`.
pub fn crossfade_images(a: &Image, b: &Image, t: f32) -> Image {
    if a.is_empty() {
        return b.clone();
    }
    if b.is_empty() {
        return a.clone();
    }
    let mut out = a.clone();
    for ((d, ap), bp) in out.data.chunks_exact_mut(4).zip(a.data.chunks_exact(4)).zip(b.data.chunks_exact(4)) {
        let blended = crossfade([ap[0], ap[1], ap[2], ap[3]], [bp[0], bp[1], bp[2], bp[3]], t);
        d.copy_from_slice(&blended);
    }
    out
}

/// Premultiply every pixel's colour channels by its alpha.
pub fn premult(img: &Image) -> Image {
    let mut out = img.clone();
    for px in out.data.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        for c in &mut px[..3] {
            *c = mul_div255_u8(u16::from(*c), a);
        }
    }
    out
}

/// Divide every pixel's colour channels by its alpha (identity on
/// zero-alpha pixels, spec §8: "`Premult` then `Unpremult` equals identity
/// on pixels with alpha > 0").
pub fn unpremult(img: &Image) -> Image {
    let mut out = img.clone();
    for px in out.data.chunks_exact_mut(4) {
        let a = px[3];
        if a == 0 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u32::from(*c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8;
        }
    }
    out
}

/// Invert colour channels, leave alpha untouched.
pub fn invert(img: &Image) -> Image {
    let mut out = img.clone();
    for px in out.data.chunks_exact_mut(4) {
        px[0] = 255 - px[0];
        px[1] = 255 - px[1];
        px[2] = 255 - px[2];
    }
    out
}

/// A named colour-map curve (spec §4.4 `ColorMapEffect.map_name`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    /// Nearest-neighbour sampling.
    Nearest,
    /// Bilinear / triangle sampling.
    Linear,
    /// Cubic-lobed (Catmull-Rom-ish) sampling.
    Cubic,
}

/// A named noise distribution (spec §4.4 `NoiseEffect.type`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseKind {
    /// Uniform white noise.
    Uniform,
    /// Gaussian-distributed noise.
    Gaussian,
}

/// The image-algebra collaborator: resize, rotate, synth generators,
/// colour-map and per-channel arithmetic the core calls but does not
/// itself implement (spec §1 "out of scope...the core *calls* those
/// primitives", §9 Non-goals).
pub trait ImageAlgebra: Send + Sync {
    /// Solid-colour fill.
    fn fill(&self, spec: ImageSpec, color: [f32; 4]) -> Image;
    /// Alternating-square checkerboard.
    fn checkers(&self, spec: ImageSpec, checker_size: (u32, u32), color1: [f32; 4], color2: [f32; 4]) -> Image;
    /// Typed random field.
    fn noise(&self, spec: ImageSpec, kind: NoiseKind, a: f64, b: f64, mono: bool, seed: u64) -> Image;
    /// Two-point linear colour ramp.
    fn gradient(&self, spec: ImageSpec, color1: [f32; 4], color2: [f32; 4]) -> Image;
    /// Rasterize `text` at `pos` onto a transparent buffer.
    fn text(&self, spec: ImageSpec, pos: (f32, f32), text: &str, font_size: f32, font_name: &str, color: [f32; 4]) -> Image;
    /// Apply a named colour-map curve.
    fn color_map(&self, img: &Image, map_name: &str) -> Image;
    /// Per-channel power curve.
    fn pow(&self, img: &Image, value: f64) -> Image;
    /// Saturation adjustment (0 = grayscale, 1 = identity).
    fn saturate(&self, img: &Image, value: f64) -> Image;
    /// Flip vertically.
    fn flip(&self, img: &Image) -> Image;
    /// Flip horizontally.
    fn flop(&self, img: &Image) -> Image;
    /// Rotate by `angle_degrees` around the image center, resampling with
    /// `filter`. Any angle is accepted; the output canvas keeps the input's
    /// dimensions, so a non-right-angle rotation crops corners and exposes
    /// transparent background in them.
    fn rotate(&self, img: &Image, angle_degrees: f64, filter: FilterKind) -> Image;
    /// Resize to `spec`, resampling with `filter`.
    fn resize(&self, img: &Image, spec: ImageSpec, filter: FilterKind) -> Image;
}

/// Production [`ImageAlgebra`] implementation backed by the `image` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuImageAlgebra;

fn to_rgba_image(img: &Image) -> image::RgbaImage {
    image::RgbaImage::from_raw(img.spec.width, img.spec.height, img.data.clone())
        .unwrap_or_else(|| image::RgbaImage::new(img.spec.width, img.spec.height))
}

fn from_rgba_image(buf: image::RgbaImage) -> Image {
    let (width, height) = buf.dimensions();
    Image {
        spec: ImageSpec::new(width, height),
        data: buf.into_raw(),
    }
}

fn color_u8(c: [f32; 4]) -> [u8; 4] {
    [
        (c[0].clamp(0.0, 1.0) * 255.0).round() as u8,
        (c[1].clamp(0.0, 1.0) * 255.0).round() as u8,
        (c[2].clamp(0.0, 1.0) * 255.0).round() as u8,
        (c[3].clamp(0.0, 1.0) * 255.0).round() as u8,
    ]
}

fn filter_type(filter: FilterKind) -> image::imageops::FilterType {
    match filter {
        FilterKind::Nearest => image::imageops::FilterType::Nearest,
        FilterKind::Linear => image::imageops::FilterType::Triangle,
        FilterKind::Cubic => image::imageops::FilterType::CatmullRom,
    }
}

/// Rotate `src` by an angle that isn't a multiple of 90°, keeping the
/// canvas the same size as the input. Each output pixel is mapped back to
/// source space by inverse-rotating around the image center; pixels whose
/// source coordinate falls outside the original bounds come out transparent.
/// `FilterKind::Nearest` samples the closest source texel; `Linear` and
/// `Cubic` both resolve to bilinear sampling here (the `image` crate's own
/// `imageops::resize`/rotate90 family doesn't expose a free-angle cubic
/// kernel to reuse).
fn rotate_arbitrary(src: &image::RgbaImage, angle_degrees: f64, filter: FilterKind) -> image::RgbaImage {
    let (width, height) = src.dimensions();
    let mut out = image::RgbaImage::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }
    let theta = -angle_degrees.to_radians();
    let (sin_t, cos_t) = theta.sin_cos();
    let cx = f64::from(width) / 2.0;
    let cy = f64::from(height) / 2.0;
    let nearest = matches!(filter, FilterKind::Nearest);
    for y in 0..height {
        for x in 0..width {
            let dx = f64::from(x) + 0.5 - cx;
            let dy = f64::from(y) + 0.5 - cy;
            let sx = dx * cos_t - dy * sin_t + cx - 0.5;
            let sy = dx * sin_t + dy * cos_t + cy - 0.5;
            let px = if nearest {
                sample_nearest(src, sx, sy)
            } else {
                sample_bilinear(src, sx, sy)
            };
            out.put_pixel(x, y, image::Rgba(px));
        }
    }
    out
}

fn sample_nearest(src: &image::RgbaImage, x: f64, y: f64) -> [u8; 4] {
    let (width, height) = src.dimensions();
    let xi = x.round();
    let yi = y.round();
    if xi < 0.0 || yi < 0.0 || xi >= f64::from(width) || yi >= f64::from(height) {
        return [0, 0, 0, 0];
    }
    src.get_pixel(xi as u32, yi as u32).0
}

fn sample_bilinear(src: &image::RgbaImage, x: f64, y: f64) -> [u8; 4] {
    let (width, height) = src.dimensions();
    if x < -1.0 || y < -1.0 || x > f64::from(width) || y > f64::from(height) {
        return [0, 0, 0, 0];
    }
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let get = |ix: i64, iy: i64| -> [f64; 4] {
        if ix < 0 || iy < 0 || ix >= i64::from(width) || iy >= i64::from(height) {
            [0.0, 0.0, 0.0, 0.0]
        } else {
            let p = src.get_pixel(ix as u32, iy as u32).0;
            [f64::from(p[0]), f64::from(p[1]), f64::from(p[2]), f64::from(p[3])]
        }
    };
    let x0i = x0 as i64;
    let y0i = y0 as i64;
    let p00 = get(x0i, y0i);
    let p10 = get(x0i + 1, y0i);
    let p01 = get(x0i, y0i + 1);
    let p11 = get(x0i + 1, y0i + 1);
    let mut out = [0u8; 4];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        *slot = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Deterministic xorshift generator used by [`CpuImageAlgebra::noise`] so
/// `seed` reproduces identical frames across runs.
fn xorshift64(state: &mut u64) -> u64 {
    *state ^= *state << 13;
    *state ^= *state >> 7;
    *state ^= *state << 17;
    *state
}

impl ImageAlgebra for CpuImageAlgebra {
    fn fill(&self, spec: ImageSpec, color: [f32; 4]) -> Image {
        let px = color_u8(color);
        let mut img = Image::blank(spec);
        for chunk in img.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
        img
    }

    fn checkers(&self, spec: ImageSpec, checker_size: (u32, u32), color1: [f32; 4], color2: [f32; 4]) -> Image {
        let (cw, ch) = (checker_size.0.max(1), checker_size.1.max(1));
        let c1 = color_u8(color1);
        let c2 = color_u8(color2);
        let mut img = Image::blank(spec);
        for y in 0..spec.height {
            for x in 0..spec.width {
                let even = ((x / cw) + (y / ch)) % 2 == 0;
                let idx = (y as usize * spec.width as usize + x as usize) * 4;
                img.data[idx..idx + 4].copy_from_slice(if even { &c1 } else { &c2 });
            }
        }
        img
    }

    fn noise(&self, spec: ImageSpec, kind: NoiseKind, a: f64, b: f64, mono: bool, seed: u64) -> Image {
        let mut state = seed.wrapping_mul(2_685_821_657_736_338_717).max(1);
        let mut img = Image::blank(spec);
        for chunk in img.data.chunks_exact_mut(4) {
            let sample = |state: &mut u64| -> f64 {
                let bits = xorshift64(state);
                let unit = (bits >> 11) as f64 / (1u64 << 53) as f64;
                match kind {
                    NoiseKind::Uniform => a + unit * (b - a),
                    NoiseKind::Gaussian => {
                        let bits2 = xorshift64(state);
                        let unit2 = (bits2 >> 11) as f64 / (1u64 << 53) as f64;
                        let radius = (-2.0 * (unit.max(1e-12)).ln()).sqrt();
                        let theta = std::f64::consts::TAU * unit2;
                        a + b * radius * theta.cos()
                    }
                }
            };
            if mono {
                let v = (sample(&mut state).clamp(0.0, 1.0) * 255.0) as u8;
                chunk[0] = v;
                chunk[1] = v;
                chunk[2] = v;
            } else {
                chunk[0] = (sample(&mut state).clamp(0.0, 1.0) * 255.0) as u8;
                chunk[1] = (sample(&mut state).clamp(0.0, 1.0) * 255.0) as u8;
                chunk[2] = (sample(&mut state).clamp(0.0, 1.0) * 255.0) as u8;
            }
            chunk[3] = 255;
        }
        img
    }

    fn gradient(&self, spec: ImageSpec, color1: [f32; 4], color2: [f32; 4]) -> Image {
        let mut img = Image::blank(spec);
        let denom = (spec.height.max(2) - 1) as f32;
        for y in 0..spec.height {
            let t = y as f32 / denom;
            let px = color_u8([
                color1[0] + (color2[0] - color1[0]) * t,
                color1[1] + (color2[1] - color1[1]) * t,
                color1[2] + (color2[2] - color1[2]) * t,
                color1[3] + (color2[3] - color1[3]) * t,
            ]);
            for x in 0..spec.width {
                let idx = (y as usize * spec.width as usize + x as usize) * 4;
                img.data[idx..idx + 4].copy_from_slice(&px);
            }
        }
        img
    }

    fn text(&self, spec: ImageSpec, pos: (f32, f32), text: &str, _font_size: f32, _font_name: &str, color: [f32; 4]) -> Image {
        tracing::debug!(chars = text.len(), "text node rasterized without a glyph rasterizer collaborator");
        let mut img = Image::blank(spec);
        let px = color_u8(color);
        let (x0, y0) = (pos.0.max(0.0) as u32, pos.1.max(0.0) as u32);
        for (i, _) in text.chars().enumerate() {
            let x = x0 + i as u32;
            if x >= spec.width || y0 >= spec.height {
                break;
            }
            let idx = (y0 as usize * spec.width as usize + x as usize) * 4;
            img.data[idx..idx + 4].copy_from_slice(&px);
        }
        img
    }

    fn color_map(&self, img: &Image, map_name: &str) -> Image {
        match map_name {
            "invert" => invert(img),
            _ => img.clone(),
        }
    }

    fn pow(&self, img: &Image, value: f64) -> Image {
        let mut out = img.clone();
        for px in out.data.chunks_exact_mut(4) {
            for c in &mut px[..3] {
                let v = (f64::from(*c) / 255.0).powf(value).clamp(0.0, 1.0);
                *c = (v * 255.0).round() as u8;
            }
        }
        out
    }

    fn saturate(&self, img: &Image, value: f64) -> Image {
        let mut out = img.clone();
        for px in out.data.chunks_exact_mut(4) {
            let luma = 0.2126 * f64::from(px[0]) + 0.7152 * f64::from(px[1]) + 0.0722 * f64::from(px[2]);
            for c in &mut px[..3] {
                let v = luma + (f64::from(*c) - luma) * value;
                *c = v.clamp(0.0, 255.0).round() as u8;
            }
        }
        out
    }

    fn flip(&self, img: &Image) -> Image {
        from_rgba_image(image::imageops::flip_vertical(&to_rgba_image(img)))
    }

    fn flop(&self, img: &Image) -> Image {
        from_rgba_image(image::imageops::flip_horizontal(&to_rgba_image(img)))
    }

    fn rotate(&self, img: &Image, angle_degrees: f64, filter: FilterKind) -> Image {
        let normalized = angle_degrees.rem_euclid(360.0);
        let buf = to_rgba_image(img);
        let rotated = if normalized.abs() < f64::EPSILON {
            buf
        } else if (normalized - 90.0).abs() < f64::EPSILON {
            image::imageops::rotate90(&buf)
        } else if (normalized - 180.0).abs() < f64::EPSILON {
            image::imageops::rotate180(&buf)
        } else if (normalized - 270.0).abs() < f64::EPSILON {
            image::imageops::rotate270(&buf)
        } else {
            rotate_arbitrary(&buf, angle_degrees, filter)
        };
        from_rgba_image(rotated)
    }

    fn resize(&self, img: &Image, spec: ImageSpec, filter: FilterKind) -> Image {
        let buf = to_rgba_image(img);
        let resized = image::imageops::resize(&buf, spec.width, spec.height, filter_type(filter));
        from_rgba_image(resized)
    }
}
