//! Separable Gaussian blur.

use rayon::prelude::*;

use crate::buffer::{BYTES_PER_PIXEL, PixelBuffer};
use crate::logging::{PerfSpan, targets};

/// Build a normalized 1D Gaussian kernel of `2 * radius + 1` taps.
fn gaussian_kernel(radius: usize, sigma: f32) -> Vec<f32> {
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

/// Blur all four channels with a Gaussian of radius `round(value)` and
/// sigma `value / 3`, clamping samples at the edges.
///
/// The horizontal pass keeps full `f32` precision; only the vertical pass
/// rounds back to 8 bits. Rows are processed in parallel, each row's result
/// depends only on the source, so the output is deterministic.
pub fn gaussian_blur(source: &PixelBuffer, value: f32) -> PixelBuffer {
    let radius = value.round().max(0.0) as usize;
    if radius == 0 || source.is_empty() {
        return source.clone();
    }

    let _span = PerfSpan::new("gaussian_blur");
    let kernel = gaussian_kernel(radius, value / 3.0);
    let width = source.width() as usize;
    let height = source.height() as usize;
    let stride = width * BYTES_PER_PIXEL;
    let src = source.as_raw();

    let mut horizontal = vec![0.0f32; stride * height];
    horizontal
        .par_chunks_exact_mut(stride)
        .zip(src.par_chunks_exact(stride))
        .for_each(|(row, src_row)| {
            for x in 0..width {
                let mut acc = [0.0f32; 4];
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = (x + k).saturating_sub(radius).min(width - 1);
                    let base = sx * BYTES_PER_PIXEL;
                    for (c, channel) in acc.iter_mut().enumerate() {
                        *channel += weight * src_row[base + c] as f32;
                    }
                }
                row[x * BYTES_PER_PIXEL..(x + 1) * BYTES_PER_PIXEL].copy_from_slice(&acc);
            }
        });

    let mut out = source.clone();
    out.image_mut()
        .par_chunks_exact_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width {
                let mut acc = [0.0f32; 4];
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = (y + k).saturating_sub(radius).min(height - 1);
                    let base = sy * stride + x * BYTES_PER_PIXEL;
                    for (c, channel) in acc.iter_mut().enumerate() {
                        *channel += weight * horizontal[base + c];
                    }
                }
                for (c, channel) in acc.iter().enumerate() {
                    row[x * BYTES_PER_PIXEL + c] = channel.round().clamp(0.0, 255.0) as u8;
                }
            }
        });

    tracing::trace!(
        target: targets::FILTER,
        radius,
        width,
        height,
        "gaussian blur"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(4, 4.0 / 3.0);
        assert_eq!(kernel.len(), 9);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        for i in 0..4 {
            assert!((kernel[i] - kernel[8 - i]).abs() < 1e-7);
        }
        assert!(kernel[4] > kernel[3]);
    }

    #[test]
    fn test_uniform_image_is_unchanged() {
        let source = PixelBuffer::filled(12, 7, Rgba([90, 160, 30, 200]));
        let out = gaussian_blur(&source, 6.0);
        assert_eq!(out, source);
    }

    #[test]
    fn test_sub_half_radius_is_identity() {
        let source = PixelBuffer::white(4, 4);
        assert!(gaussian_blur(&source, 0.4).shares_storage(&source));
    }

    #[test]
    fn test_point_spreads_symmetrically() {
        let mut source = PixelBuffer::new(9, 9);
        source.image_mut().put_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let out = gaussian_blur(&source, 3.0);

        let center = out.pixel(4, 4).unwrap();
        let left = out.pixel(3, 4).unwrap();
        let right = out.pixel(5, 4).unwrap();
        let up = out.pixel(4, 3).unwrap();
        assert!(center[3] < 255);
        assert!(left[3] > 0);
        assert_eq!(left, right);
        assert!((left[3] as i32 - up[3] as i32).abs() <= 1);
        assert!(center[3] > left[3]);
    }

    #[test]
    fn test_deterministic() {
        let mut source = PixelBuffer::new(32, 16);
        for (x, y, px) in source.image_mut().enumerate_pixels_mut() {
            *px = Rgba([(x * 7) as u8, (y * 13) as u8, ((x + y) * 3) as u8, 255]);
        }
        assert_eq!(gaussian_blur(&source, 5.5), gaussian_blur(&source, 5.5));
    }
}
