//! Non-destructive adjustment filters.
//!
//! Filters never accumulate. The first application to a layer records its
//! current pixels as the layer's baseline, and every later application,
//! of any filter, recomputes the visible pixels from that baseline alone:
//!
//! ```text
//! apply(brightness, 40)  -> current = brightness(baseline, 40)
//! apply(contrast, 20)    -> current = contrast(baseline, 20)   // brightness gone
//! apply(contrast, 0)     -> current = baseline
//! ```
//!
//! The last value set for each filter is still tracked on the layer so a
//! UI can show it, but only the most recent filter is realized.

mod adjust;
mod blur;

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use adjust::adjust_pixel;
pub use blur::gaussian_blur;

use crate::buffer::PixelBuffer;
use crate::error::CanvasError;
use crate::layer::Layer;
use crate::logging::targets;

/// A supported adjustment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Additive shift of every color channel.
    Brightness,
    /// Rescale around the 128 midpoint.
    Contrast,
    /// Scale HSV saturation.
    Saturation,
    /// Rotate HSV hue, in degrees.
    Hue,
    /// Separable Gaussian blur, value is the pixel radius.
    Blur,
    /// Interpolate toward Rec. 601 luma, value is a percentage.
    Grayscale,
}

impl FilterKind {
    /// Every filter, in shader id order.
    pub const ALL: [FilterKind; 6] = [
        FilterKind::Brightness,
        FilterKind::Contrast,
        FilterKind::Saturation,
        FilterKind::Hue,
        FilterKind::Blur,
        FilterKind::Grayscale,
    ];

    /// Lowercase name as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            FilterKind::Brightness => "brightness",
            FilterKind::Contrast => "contrast",
            FilterKind::Saturation => "saturation",
            FilterKind::Hue => "hue",
            FilterKind::Blur => "blur",
            FilterKind::Grayscale => "grayscale",
        }
    }

    /// Valid values. Anything outside is clamped.
    pub fn domain(self) -> RangeInclusive<f32> {
        match self {
            FilterKind::Brightness | FilterKind::Contrast | FilterKind::Saturation => {
                -100.0..=100.0
            }
            FilterKind::Hue => -180.0..=180.0,
            FilterKind::Blur => 0.0..=20.0,
            FilterKind::Grayscale => 0.0..=100.0,
        }
    }

    /// The value at which the filter leaves pixels untouched.
    pub fn neutral(self) -> f32 {
        0.0
    }

    /// Clamp a value into [`domain`](Self::domain). NaN maps to neutral.
    pub fn clamp(self, value: f32) -> f32 {
        if value.is_nan() {
            return self.neutral();
        }
        let domain = self.domain();
        value.clamp(*domain.start(), *domain.end())
    }

    /// Whether the filter is a per-pixel point operation.
    ///
    /// Point operations can run in a single fragment pass on the GPU; blur
    /// needs neighbouring pixels and stays on the CPU.
    pub fn is_point_op(self) -> bool {
        !matches!(self, FilterKind::Blur)
    }

    /// Identifier passed to the filter stage of the compositing shader.
    pub fn shader_id(self) -> u32 {
        match self {
            FilterKind::Brightness => 0,
            FilterKind::Contrast => 1,
            FilterKind::Saturation => 2,
            FilterKind::Hue => 3,
            FilterKind::Blur => 4,
            FilterKind::Grayscale => 5,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterKind {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        FilterKind::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| CanvasError::UnknownFilter(s.to_string()))
    }
}

/// Compute `kind` at `value` over `source`, returning a new buffer.
///
/// `value` is clamped first. At the neutral value the result is a clone of
/// `source` (sharing its storage), so it is pixel-identical by construction.
pub fn render_filter(source: &PixelBuffer, kind: FilterKind, value: f32) -> PixelBuffer {
    let value = kind.clamp(value);
    if value == kind.neutral() {
        return source.clone();
    }

    match kind {
        FilterKind::Blur => gaussian_blur(source, value),
        _ => adjust::map_pixels(source, |px| adjust_pixel(px, kind, value)),
    }
}

/// Apply a filter to a layer, recomputing from its baseline.
///
/// Records the baseline on first use and the clamped value in the layer's
/// filter table. Returns the new current buffer.
pub fn apply_filter(layer: &mut Layer, kind: FilterKind, value: f32) -> &PixelBuffer {
    let value = kind.clamp(value);
    let first = layer.baseline().is_none();
    let computed = render_filter(layer.ensure_baseline(), kind, value);

    tracing::debug!(
        target: targets::FILTER,
        id = layer.id().id(),
        filter = kind.name(),
        value,
        first,
        "recomputed layer from baseline"
    );

    layer.filters_mut().insert(kind, value);
    layer.set_current(computed);
    layer.current()
}

/// Restore a layer's baseline and forget every tracked filter value.
///
/// Returns `false` if the layer was never filtered.
pub fn reset_filters(layer: &mut Layer) -> bool {
    let Some(baseline) = layer.baseline().cloned() else {
        return false;
    };
    layer.filters_mut().clear();
    layer.set_current(baseline);

    tracing::debug!(
        target: targets::FILTER,
        id = layer.id().id(),
        "reset filters to baseline"
    );
    true
}
