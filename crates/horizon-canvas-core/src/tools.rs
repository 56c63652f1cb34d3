//! Raster tools that produce new layer buffers.
//!
//! Every function here is pure: it reads a buffer and returns a fresh one.
//! The session installs results with `replace_buffer`, which snapshots.
//! Coordinates are canvas pixels, already mapped from pointer events by
//! the caller.

use glam::Vec2;
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blend::{BlendMode, composite_pixel};
use crate::buffer::{PixelBuffer, TRANSPARENT};
use crate::logging::targets;

/// A position in canvas space.
pub type CanvasPoint = Vec2;

/// Smallest brush diameter.
pub const MIN_BRUSH_SIZE: f32 = 1.0;
/// Largest brush diameter.
pub const MAX_BRUSH_SIZE: f32 = 50.0;
/// A crop selection must exceed this many pixels in both directions.
pub const MIN_CROP_EXTENT: f32 = 10.0;
/// Smallest content scale factor.
pub const MIN_CONTENT_SCALE: f32 = 0.1;
/// Largest content scale factor.
pub const MAX_CONTENT_SCALE: f32 = 3.0;

/// A completed tool gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "lowercase")]
pub enum ToolAction {
    /// Paint a polyline with round caps and joins.
    Brush {
        points: Vec<CanvasPoint>,
        size: f32,
        color: [u8; 4],
    },
    /// Clear a polyline to full transparency.
    Eraser { points: Vec<CanvasPoint>, size: f32 },
    /// Keep the selection between two corners, moved to the top-left.
    Crop { from: CanvasPoint, to: CanvasPoint },
    /// Translate the layer content.
    Move { dx: i32, dy: i32 },
    /// Scale the layer content about the canvas center.
    Scale { factor: f32 },
    /// Multiply the preview zoom.
    Zoom { factor: f32 },
    /// Pan the preview.
    Pan { delta: CanvasPoint },
}

impl ToolAction {
    /// Whether the action edits pixels (and therefore snapshots) rather
    /// than only changing the view.
    pub fn edits_pixels(&self) -> bool {
        !matches!(self, ToolAction::Zoom { .. } | ToolAction::Pan { .. })
    }
}

/// Coverage of a round-capped polyline of diameter `size`.
///
/// Returns one flag per pixel, row-major. A pixel is covered when its
/// center lies within `size / 2` of the polyline.
fn stroke_mask(width: u32, height: u32, points: &[CanvasPoint], size: f32) -> Vec<bool> {
    let mut mask = vec![false; width as usize * height as usize];
    let radius = size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE) / 2.0;

    let segments: Vec<(Vec2, Vec2)> = match points {
        [] => return mask,
        [only] => vec![(*only, *only)],
        _ => points.windows(2).map(|w| (w[0], w[1])).collect(),
    };

    for (a, b) in segments {
        let min = a.min(b) - Vec2::splat(radius);
        let max = a.max(b) + Vec2::splat(radius);
        let x0 = min.x.floor().max(0.0) as u32;
        let y0 = min.y.floor().max(0.0) as u32;
        let x1 = (max.x.ceil().max(0.0) as u32).min(width);
        let y1 = (max.y.ceil().max(0.0) as u32).min(height);

        for y in y0..y1 {
            for x in x0..x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                if distance_to_segment(p, a, b) <= radius {
                    mask[y as usize * width as usize + x as usize] = true;
                }
            }
        }
    }
    mask
}

fn distance_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Paint a stroke of `color` over `buffer`.
///
/// Each covered pixel is blended once, so overlapping segments of a
/// translucent stroke do not darken.
pub fn brush_stroke(buffer: &PixelBuffer, points: &[CanvasPoint], size: f32, color: [u8; 4]) -> PixelBuffer {
    let mut out = buffer.clone();
    let (width, height) = out.dimensions();
    let mask = stroke_mask(width, height, points, size);
    if !mask.contains(&true) {
        return out;
    }

    let image = out.image_mut();
    for (covered, (_, _, px)) in mask.iter().zip(image.enumerate_pixels_mut()) {
        if *covered {
            px.0 = composite_pixel(px.0, color, BlendMode::Normal, 1.0);
        }
    }

    debug!(
        target: targets::TOOLS,
        points = points.len(),
        size,
        "brush stroke"
    );
    out
}

/// Clear every pixel under a stroke to full transparency.
pub fn eraser_stroke(buffer: &PixelBuffer, points: &[CanvasPoint], size: f32) -> PixelBuffer {
    let mut out = buffer.clone();
    let (width, height) = out.dimensions();
    let mask = stroke_mask(width, height, points, size);
    if !mask.contains(&true) {
        return out;
    }

    let image = out.image_mut();
    for (covered, (_, _, px)) in mask.iter().zip(image.enumerate_pixels_mut()) {
        if *covered {
            *px = TRANSPARENT;
        }
    }

    debug!(
        target: targets::TOOLS,
        points = points.len(),
        size,
        "eraser stroke"
    );
    out
}

/// Copy the rectangle between `from` and `to` onto the top-left corner of
/// a white canvas.
///
/// Returns `None` when the selection is not larger than
/// [`MIN_CROP_EXTENT`] in both directions.
pub fn crop(
    buffer: &PixelBuffer,
    from: CanvasPoint,
    to: CanvasPoint,
    canvas_width: u32,
    canvas_height: u32,
) -> Option<PixelBuffer> {
    let min = from.min(to).max(Vec2::ZERO);
    let size = (from.max(to) - min).max(Vec2::ZERO);
    if size.x <= MIN_CROP_EXTENT || size.y <= MIN_CROP_EXTENT {
        debug!(
            target: targets::TOOLS,
            width = size.x,
            height = size.y,
            "crop selection too small, ignored"
        );
        return None;
    }

    let region = buffer.crop(
        min.x.round() as u32,
        min.y.round() as u32,
        size.x.round() as u32,
        size.y.round() as u32,
    );

    let mut out = PixelBuffer::white(canvas_width, canvas_height);
    imageops::replace(out.image_mut(), region.as_image(), 0, 0);

    debug!(
        target: targets::TOOLS,
        x = min.x,
        y = min.y,
        width = region.width(),
        height = region.height(),
        "cropped layer"
    );
    Some(out)
}

/// Place the content translated by `(dx, dy)` on a white canvas.
pub fn move_content(buffer: &PixelBuffer, dx: i32, dy: i32, canvas_width: u32, canvas_height: u32) -> PixelBuffer {
    let mut out = PixelBuffer::white(canvas_width, canvas_height);
    imageops::replace(out.image_mut(), buffer.as_image(), dx as i64, dy as i64);
    out
}

/// Scale the content by `factor` and center it on a white canvas.
pub fn scale_content(buffer: &PixelBuffer, factor: f32, canvas_width: u32, canvas_height: u32) -> PixelBuffer {
    let factor = if factor.is_finite() {
        factor.clamp(MIN_CONTENT_SCALE, MAX_CONTENT_SCALE)
    } else {
        1.0
    };
    let width = ((buffer.width() as f32 * factor).round() as u32).max(1);
    let height = ((buffer.height() as f32 * factor).round() as u32).max(1);
    place_centered(buffer, width, height, canvas_width, canvas_height)
}

/// Fit an image inside the canvas, preserving aspect ratio, centered on
/// white. Small images are scaled up.
pub fn fit_to_canvas(image: &PixelBuffer, canvas_width: u32, canvas_height: u32) -> PixelBuffer {
    if image.is_empty() {
        return PixelBuffer::white(canvas_width, canvas_height);
    }
    let scale = (canvas_width as f32 / image.width() as f32).min(canvas_height as f32 / image.height() as f32);
    let width = ((image.width() as f32 * scale).round() as u32).clamp(1, canvas_width.max(1));
    let height = ((image.height() as f32 * scale).round() as u32).clamp(1, canvas_height.max(1));
    place_centered(image, width, height, canvas_width, canvas_height)
}

fn place_centered(image: &PixelBuffer, width: u32, height: u32, canvas_width: u32, canvas_height: u32) -> PixelBuffer {
    let resized = if (width, height) == image.dimensions() {
        image.as_image().clone()
    } else {
        imageops::resize(image.as_image(), width, height, FilterType::Triangle)
    };

    let x = (canvas_width as i64 - width as i64) / 2;
    let y = (canvas_height as i64 - height as i64) / 2;
    let mut out = PixelBuffer::white(canvas_width, canvas_height);
    imageops::overlay(out.image_mut(), &resized, x, y);
    out
}
