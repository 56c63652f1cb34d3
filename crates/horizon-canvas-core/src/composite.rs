//! Flattening visible layers for export.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blend::{BlendMode, composite_pixel};
use crate::buffer::{BYTES_PER_PIXEL, PixelBuffer, TRANSPARENT, WHITE};
use crate::layer::Layer;
use crate::logging::{PerfSpan, targets};

/// What the export canvas starts as before the first layer is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    /// Fully transparent. Areas no layer covers stay transparent.
    #[default]
    Transparent,
    /// Opaque white.
    White,
}

impl Background {
    /// The RGBA value of an uncovered canvas pixel.
    pub fn rgba(self) -> Rgba<u8> {
        match self {
            Background::Transparent => TRANSPARENT,
            Background::White => WHITE,
        }
    }

    /// A canvas of the given size filled with this background.
    pub fn canvas(self, width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::filled(width, height, self.rgba())
    }
}

/// Blend `source` onto `canvas` at the origin.
///
/// Only the overlapping rectangle is touched; canvas pixels outside a
/// smaller source are left as they are.
pub fn blend_onto(canvas: &mut RgbaImage, source: &RgbaImage, mode: BlendMode, opacity: f32) {
    let width = canvas.width().min(source.width()) as usize;
    let height = canvas.height().min(source.height()) as usize;
    if width == 0 || height == 0 || opacity <= 0.0 {
        return;
    }

    let dst_stride = canvas.width() as usize * BYTES_PER_PIXEL;
    let src_stride = source.width() as usize * BYTES_PER_PIXEL;
    let src = source.as_raw();

    canvas
        .par_chunks_exact_mut(dst_stride)
        .take(height)
        .enumerate()
        .for_each(|(y, dst_row)| {
            let src_row = &src[y * src_stride..y * src_stride + width * BYTES_PER_PIXEL];
            for (dst, s) in dst_row
                .chunks_exact_mut(BYTES_PER_PIXEL)
                .zip(src_row.chunks_exact(BYTES_PER_PIXEL))
            {
                let out = composite_pixel([dst[0], dst[1], dst[2], dst[3]], [s[0], s[1], s[2], s[3]], mode, opacity);
                dst.copy_from_slice(&out);
            }
        });
}

/// Draw `pixels` over opaque white, for formats without an alpha channel.
pub fn onto_white(pixels: &PixelBuffer) -> PixelBuffer {
    let (width, height) = pixels.dimensions();
    let mut flat = Background::White.canvas(width, height);
    blend_onto(flat.image_mut(), pixels.as_image(), BlendMode::Normal, 1.0);
    flat
}

/// Composite every visible layer bottom to top.
///
/// The canvas is as large as the largest layer buffer, visible or not.
/// Returns `None` when there are no layers.
pub fn flatten(layers: &[Layer], background: Background) -> Option<PixelBuffer> {
    let (width, height) = layers
        .iter()
        .map(|layer| layer.current().dimensions())
        .reduce(|(w, h), (lw, lh)| (w.max(lw), h.max(lh)))?;

    let _span = PerfSpan::new("flatten");
    let mut canvas = background.canvas(width, height);

    for layer in layers.iter().filter(|layer| layer.is_visible()) {
        let source = layer.current();
        if source.dimensions() != (width, height) {
            debug!(
                target: targets::COMPOSITE,
                id = layer.id().id(),
                layer_width = source.width(),
                layer_height = source.height(),
                width,
                height,
                "layer smaller than canvas, uncovered region left as background"
            );
        }
        blend_onto(
            canvas.image_mut(),
            source.as_image(),
            layer.blend_mode(),
            layer.opacity(),
        );
    }

    debug!(
        target: targets::COMPOSITE,
        layers = layers.len(),
        width,
        height,
        "flattened for export"
    );
    Some(canvas)
}
