//! Texture upload and readback.
//!
//! wgpu requires `bytes_per_row` of buffer/texture copies to be a multiple
//! of 256. Readback copies into a padded staging buffer and strips the
//! padding row by row.

use horizon_canvas_core::PixelBuffer;
use tracing::debug;

use crate::context::GraphicsContext;
use crate::error::{RenderError, RenderResult};

/// Bytes per pixel for RGBA8 format.
const BYTES_PER_PIXEL: u32 = 4;

/// Helper for calculating buffer dimensions with proper row alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per row without padding.
    pub unpadded_bytes_per_row: u32,
    /// Bytes per row with padding (aligned to 256).
    pub padded_bytes_per_row: u32,
}

impl BufferDimensions {
    /// Create buffer dimensions for the given pixel dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        let unpadded_bytes_per_row = width * BYTES_PER_PIXEL;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        Self {
            width,
            height,
            unpadded_bytes_per_row,
            padded_bytes_per_row,
        }
    }

    /// Total buffer size in bytes.
    pub fn buffer_size(&self) -> u64 {
        self.padded_bytes_per_row as u64 * self.height as u64
    }

    /// Strip row padding from mapped buffer contents.
    pub fn unpad(&self, data: &[u8]) -> Vec<u8> {
        let mut pixels = Vec::with_capacity((self.unpadded_bytes_per_row * self.height) as usize);
        for row in data
            .chunks(self.padded_bytes_per_row as usize)
            .take(self.height as usize)
        {
            pixels.extend_from_slice(&row[..self.unpadded_bytes_per_row as usize]);
        }
        pixels
    }
}

/// Create an `Rgba8Unorm` texture holding `buffer`.
///
/// The format is linear, so bytes are sampled exactly as stored; the
/// shaders do all blending on the raw 8-bit values.
pub fn upload_texture(ctx: &GraphicsContext, buffer: &PixelBuffer, label: &str) -> RenderResult<wgpu::Texture> {
    let (width, height) = buffer.dimensions();
    ctx.check_dimensions(width, height)?;

    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = ctx.device().create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    ctx.queue().write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        buffer.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * BYTES_PER_PIXEL),
            rows_per_image: Some(height),
        },
        size,
    );

    Ok(texture)
}

/// Read an RGBA8 texture back into a [`PixelBuffer`].
///
/// This operation is synchronous and blocks until the GPU completes the
/// transfer.
pub fn read_texture(ctx: &GraphicsContext, texture: &wgpu::Texture) -> RenderResult<PixelBuffer> {
    let width = texture.width();
    let height = texture.height();
    let device = ctx.device();
    let dims = BufferDimensions::new(width, height);

    let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("texture_readback_buffer"),
        size: dims.buffer_size(),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("texture_readback_encoder"),
    });

    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &output_buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(dims.padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );

    ctx.queue().submit(std::iter::once(encoder.finish()));

    let buffer_slice = output_buffer.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        // the receiver only goes away if this function already returned
        let _ = sender.send(result);
    });

    ctx.wait_idle();
    receiver.recv().map_err(|_| RenderError::DeviceLost)??;

    let pixels = dims.unpad(&buffer_slice.get_mapped_range());
    output_buffer.unmap();

    debug!(
        target: "horizon_canvas_render::capture",
        width,
        height,
        pixels_len = pixels.len(),
        "read texture pixels"
    );

    PixelBuffer::from_rgba(pixels, width, height).map_err(|_| RenderError::InvalidDimensions { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_dimensions_no_padding() {
        let dims = BufferDimensions::new(64, 100);
        assert_eq!(dims.unpadded_bytes_per_row, 256);
        assert_eq!(dims.padded_bytes_per_row, 256);
        assert_eq!(dims.buffer_size(), 256 * 100);
    }

    #[test]
    fn test_buffer_dimensions_with_padding() {
        let dims = BufferDimensions::new(100, 100);
        assert_eq!(dims.unpadded_bytes_per_row, 400);
        assert_eq!(dims.padded_bytes_per_row, 512);
        assert_eq!(dims.buffer_size(), 512 * 100);
    }

    #[test]
    fn test_canvas_width_padding() {
        // 800 * 4 = 3200, next multiple of 256 is 3328
        let dims = BufferDimensions::new(800, 500);
        assert_eq!(dims.padded_bytes_per_row, 3328);
    }

    #[test]
    fn test_unpad_strips_row_padding() {
        let dims = BufferDimensions::new(2, 3);
        let mut padded = vec![0u8; dims.buffer_size() as usize];
        for row in 0..3 {
            let start = row * dims.padded_bytes_per_row as usize;
            padded[start..start + 8].copy_from_slice(&[row as u8 + 1; 8]);
        }

        let pixels = dims.unpad(&padded);
        assert_eq!(pixels.len(), 2 * 3 * 4);
        assert!(pixels[..8].iter().all(|&b| b == 1));
        assert!(pixels[16..].iter().all(|&b| b == 3));
    }
}
