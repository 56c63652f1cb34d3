//! Layer blend modes and per-pixel compositing math.
//!
//! The formulas follow the W3C Compositing and Blending specification for
//! separable blend modes, applied on straight (non-premultiplied) alpha:
//!
//! ```text
//! Cs' = (1 - ab) * Cs + ab * B(Cb, Cs)
//! ao  = as + ab * (1 - as)
//! Co  = (as * Cs' + ab * Cb * (1 - as)) / ao
//! ```
//!
//! where `as` is the source alpha already multiplied by the layer opacity.
//! The fragment shader in `horizon-canvas-render` implements the same
//! equations; [`BlendMode::shader_id`] is the value it switches on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::color::{quantize, unorm};
use crate::error::CanvasError;

/// How a layer combines with the pixels beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    /// Source over.
    #[default]
    Normal,
    /// `Cb * Cs`.
    Multiply,
    /// `1 - (1 - Cb)(1 - Cs)`.
    Screen,
    /// Hard light with the layers swapped.
    Overlay,
    /// W3C soft light.
    SoftLight,
    /// Multiply or screen depending on the source.
    HardLight,
    /// Brighten the backdrop to reflect the source.
    ColorDodge,
    /// Darken the backdrop to reflect the source.
    ColorBurn,
}

impl BlendMode {
    /// Every supported mode, in shader id order.
    pub const ALL: [BlendMode; 8] = [
        BlendMode::Normal,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::SoftLight,
        BlendMode::HardLight,
        BlendMode::ColorDodge,
        BlendMode::ColorBurn,
    ];

    /// Canonical lowercase name (`"soft-light"`, ...).
    pub fn name(self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::SoftLight => "soft-light",
            BlendMode::HardLight => "hard-light",
            BlendMode::ColorDodge => "color-dodge",
            BlendMode::ColorBurn => "color-burn",
        }
    }

    /// Identifier passed to the compositing shader.
    pub fn shader_id(self) -> u32 {
        match self {
            BlendMode::Normal => 0,
            BlendMode::Multiply => 1,
            BlendMode::Screen => 2,
            BlendMode::Overlay => 3,
            BlendMode::SoftLight => 4,
            BlendMode::HardLight => 5,
            BlendMode::ColorDodge => 6,
            BlendMode::ColorBurn => 7,
        }
    }

    /// Evaluate the blend function `B(Cb, Cs)` for one normalized channel.
    pub fn blend_channel(self, backdrop: f32, source: f32) -> f32 {
        let (cb, cs) = (backdrop, source);
        match self {
            BlendMode::Normal => cs,
            BlendMode::Multiply => cb * cs,
            BlendMode::Screen => cb + cs - cb * cs,
            BlendMode::Overlay => hard_light(cs, cb),
            BlendMode::HardLight => hard_light(cb, cs),
            BlendMode::SoftLight => {
                if cs <= 0.5 {
                    cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
                } else {
                    let d = if cb <= 0.25 {
                        ((16.0 * cb - 12.0) * cb + 4.0) * cb
                    } else {
                        cb.sqrt()
                    };
                    cb + (2.0 * cs - 1.0) * (d - cb)
                }
            }
            BlendMode::ColorDodge => {
                if cb <= 0.0 {
                    0.0
                } else if cs >= 1.0 {
                    1.0
                } else {
                    (cb / (1.0 - cs)).min(1.0)
                }
            }
            BlendMode::ColorBurn => {
                if cb >= 1.0 {
                    1.0
                } else if cs <= 0.0 {
                    0.0
                } else {
                    1.0 - ((1.0 - cb) / cs).min(1.0)
                }
            }
        }
    }
}

fn hard_light(cb: f32, cs: f32) -> f32 {
    if cs <= 0.5 {
        cb * 2.0 * cs
    } else {
        let s = 2.0 * cs - 1.0;
        cb + s - cb * s
    }
}

/// Composite one source pixel over one destination pixel.
///
/// `opacity` is the layer's global alpha and is multiplied into the source
/// alpha before blending.
pub fn composite_pixel(dst: [u8; 4], src: [u8; 4], mode: BlendMode, opacity: f32) -> [u8; 4] {
    let src_a = unorm(src[3]) * opacity.clamp(0.0, 1.0);
    if src_a <= 0.0 {
        return dst;
    }

    let dst_a = unorm(dst[3]);
    let out_a = src_a + dst_a * (1.0 - src_a);

    let channel = |s: u8, d: u8| -> u8 {
        let cs = unorm(s);
        let cb = unorm(d);
        let mixed = (1.0 - dst_a) * cs + dst_a * mode.blend_channel(cb, cs);
        quantize((src_a * mixed + dst_a * cb * (1.0 - src_a)) / out_a)
    };

    [
        channel(src[0], dst[0]),
        channel(src[1], dst[1]),
        channel(src[2], dst[2]),
        quantize(out_a),
    ]
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BlendMode {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        BlendMode::ALL
            .into_iter()
            .find(|mode| mode.name() == normalized)
            .ok_or_else(|| CanvasError::UnknownBlendMode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    #[test]
    fn test_normal_opaque_replaces() {
        let out = composite_pixel(RED, [10, 200, 30, 255], BlendMode::Normal, 1.0);
        assert_eq!(out, [10, 200, 30, 255]);
    }

    #[test]
    fn test_zero_opacity_keeps_destination() {
        for mode in BlendMode::ALL {
            assert_eq!(composite_pixel(RED, BLUE, mode, 0.0), RED);
        }
    }

    #[test]
    fn test_over_transparent_is_source() {
        for mode in BlendMode::ALL {
            assert_eq!(composite_pixel([0, 0, 0, 0], BLUE, mode, 1.0), BLUE);
        }
    }

    #[test]
    fn test_multiply_red_blue_half_opacity() {
        let out = composite_pixel(RED, BLUE, BlendMode::Multiply, 0.5);
        assert!((out[0] as i32 - 127).abs() <= 1);
        assert_eq!(out[1], 0);
        assert_eq!(out[2], 0);
        assert_eq!(out[3], 255);
    }

    #[test]
    fn test_screen_and_multiply_extremes() {
        assert_eq!(BlendMode::Screen.blend_channel(0.0, 1.0), 1.0);
        assert_eq!(BlendMode::Multiply.blend_channel(1.0, 0.25), 0.25);
    }

    #[test]
    fn test_overlay_is_swapped_hard_light() {
        for &(cb, cs) in &[(0.2, 0.7), (0.8, 0.3), (0.5, 0.5)] {
            let overlay = BlendMode::Overlay.blend_channel(cb, cs);
            let hard = BlendMode::HardLight.blend_channel(cs, cb);
            assert!((overlay - hard).abs() < 1e-6);
        }
    }

    #[test]
    fn test_dodge_and_burn_edges() {
        assert_eq!(BlendMode::ColorDodge.blend_channel(0.0, 1.0), 0.0);
        assert_eq!(BlendMode::ColorDodge.blend_channel(0.5, 1.0), 1.0);
        assert_eq!(BlendMode::ColorBurn.blend_channel(1.0, 0.0), 1.0);
        assert_eq!(BlendMode::ColorBurn.blend_channel(0.5, 0.0), 0.0);
    }

    #[test]
    fn test_soft_light_neutral_gray_source() {
        for cb in [0.0, 0.1, 0.5, 0.9, 1.0] {
            assert!((BlendMode::SoftLight.blend_channel(cb, 0.5) - cb).abs() < 1e-6);
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("soft-light".parse::<BlendMode>().unwrap(), BlendMode::SoftLight);
        assert_eq!("Color_Dodge".parse::<BlendMode>().unwrap(), BlendMode::ColorDodge);
        assert!("difference".parse::<BlendMode>().is_err());
        for mode in BlendMode::ALL {
            assert_eq!(mode.to_string().parse::<BlendMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_shader_ids_are_dense() {
        for (i, mode) in BlendMode::ALL.iter().enumerate() {
            assert_eq!(mode.shader_id(), i as u32);
        }
    }
}
