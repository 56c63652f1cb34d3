//! Solo live preview of the active layer.
//!
//! The preview shows one layer only, drawn over opaque white at the current
//! zoom and pan. Other layers never appear in it; use
//! [`flatten`](crate::composite::flatten) for the combined image.

use glam::Vec2;
use image::RgbaImage;
use rayon::prelude::*;

use crate::blend::{BlendMode, composite_pixel};
use crate::buffer::{BYTES_PER_PIXEL, PixelBuffer};
use crate::layer::Layer;

/// Smallest allowed zoom factor.
pub const MIN_SCALE: f32 = 0.1;
/// Largest allowed zoom factor.
pub const MAX_SCALE: f32 = 3.0;

/// Zoom and pan applied when drawing the preview.
///
/// A layer pixel at `p` lands at `p * scale + offset` on the preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    scale: f32,
    offset: Vec2,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    /// No zoom, no pan.
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        offset: Vec2::ZERO,
    };

    /// Create a transform, clamping `scale` to `[MIN_SCALE, MAX_SCALE]`.
    pub fn new(scale: f32, offset: Vec2) -> Self {
        Self {
            scale: clamp_scale(scale),
            offset,
        }
    }

    /// Zoom factor.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Pan offset in canvas pixels.
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Set the zoom factor (clamped).
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = clamp_scale(scale);
    }

    /// Multiply the zoom factor (clamped).
    pub fn zoom_by(&mut self, factor: f32) {
        self.set_scale(self.scale * factor);
    }

    /// Move the view by `delta` canvas pixels.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Map a preview position back into layer space.
    pub fn to_layer(&self, point: Vec2) -> Vec2 {
        (point - self.offset) / self.scale
    }

    /// Whether the transform is the identity.
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

fn clamp_scale(scale: f32) -> f32 {
    if scale.is_finite() {
        scale.clamp(MIN_SCALE, MAX_SCALE)
    } else {
        1.0
    }
}

/// Draw `layer` over a white surface of `width` x `height`.
///
/// Uses nearest-neighbour sampling through `view` and the layer's own
/// opacity and blend mode. A hidden layer yields a plain white surface.
pub fn render_layer_preview(layer: &Layer, width: u32, height: u32, view: &ViewTransform) -> PixelBuffer {
    if !layer.is_visible() {
        return PixelBuffer::white(width, height);
    }
    render_pixels_preview(layer.current(), layer.blend_mode(), layer.opacity(), width, height, view)
}

/// Draw `pixels` over a white surface with the given blend mode and opacity.
pub fn render_pixels_preview(
    pixels: &PixelBuffer,
    mode: BlendMode,
    opacity: f32,
    width: u32,
    height: u32,
    view: &ViewTransform,
) -> PixelBuffer {
    let mut surface = PixelBuffer::white(width, height);
    if surface.is_empty() {
        return surface;
    }

    let source = pixels.as_image();
    let stride = width as usize * BYTES_PER_PIXEL;

    surface
        .image_mut()
        .par_chunks_exact_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, dst) in row.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let Some(src) = sample_nearest(source, view.to_layer(center)) else {
                    continue;
                };
                let out = composite_pixel([dst[0], dst[1], dst[2], dst[3]], src, mode, opacity);
                dst.copy_from_slice(&out);
            }
        });

    surface
}

fn sample_nearest(image: &RgbaImage, point: Vec2) -> Option<[u8; 4]> {
    let p = point.floor();
    if p.x < 0.0 || p.y < 0.0 {
        return None;
    }
    image.get_pixel_checked(p.x as u32, p.y as u32).map(|px| px.0)
}
