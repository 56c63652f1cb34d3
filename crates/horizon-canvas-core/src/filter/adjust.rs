//! Per-pixel adjustments (brightness, contrast, saturation, hue, grayscale).

use rayon::prelude::*;

use super::FilterKind;
use crate::buffer::{BYTES_PER_PIXEL, PixelBuffer};
use crate::color::{hsv_to_rgb, luma, quantize, rgb_to_hsv, unorm};

/// Map every pixel of `source` through `f` in parallel.
pub(super) fn map_pixels<F>(source: &PixelBuffer, f: F) -> PixelBuffer
where
    F: Fn([u8; 4]) -> [u8; 4] + Sync,
{
    let mut out = source.clone();
    out.image_mut()
        .par_chunks_exact_mut(BYTES_PER_PIXEL)
        .for_each(|px| {
            let mapped = f([px[0], px[1], px[2], px[3]]);
            px.copy_from_slice(&mapped);
        });
    out
}

/// Evaluate a point filter on one straight-alpha pixel. Alpha is preserved.
///
/// `value` must already be clamped to the filter's domain. Blur is not a
/// point operation and returns the pixel unchanged.
pub fn adjust_pixel(px: [u8; 4], kind: FilterKind, value: f32) -> [u8; 4] {
    let [r, g, b, a] = px;
    let (r, g, b) = match kind {
        FilterKind::Brightness => {
            let shift = value * 2.55;
            let add = |c: u8| (c as f32 + shift).round().clamp(0.0, 255.0) as u8;
            (add(r), add(g), add(b))
        }
        FilterKind::Contrast => {
            let factor = contrast_factor(value);
            let scale = |c: u8| (factor * (c as f32 - 128.0) + 128.0).round().clamp(0.0, 255.0) as u8;
            (scale(r), scale(g), scale(b))
        }
        FilterKind::Saturation => {
            let (h, s, v) = rgb_to_hsv(unorm(r), unorm(g), unorm(b));
            let (r, g, b) = hsv_to_rgb(h, s * (1.0 + value / 100.0), v);
            (quantize(r), quantize(g), quantize(b))
        }
        FilterKind::Hue => {
            let (h, s, v) = rgb_to_hsv(unorm(r), unorm(g), unorm(b));
            let (r, g, b) = hsv_to_rgb(h + value, s, v);
            (quantize(r), quantize(g), quantize(b))
        }
        FilterKind::Grayscale => {
            let t = value / 100.0;
            let y = luma(r as f32, g as f32, b as f32);
            let lerp = |c: u8| (c as f32 + (y - c as f32) * t).round().clamp(0.0, 255.0) as u8;
            (lerp(r), lerp(g), lerp(b))
        }
        FilterKind::Blur => (r, g, b),
    };
    [r, g, b, a]
}

/// Contrast scale factor for `c` in `[-100, 100]`.
pub(crate) fn contrast_factor(c: f32) -> f32 {
    (259.0 * (c + 255.0)) / (255.0 * (259.0 - c))
}
