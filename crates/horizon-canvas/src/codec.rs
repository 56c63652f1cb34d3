//! [`Codec`] implementation backed by the `image` crate.

use horizon_canvas_core::{CanvasError, CanvasResult, Codec, DecodedImage, ImageFormat, PixelBuffer};
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageError};
use tracing::debug;

/// Decodes anything the `image` crate recognizes and encodes PNG, JPEG,
/// BMP and lossless WebP.
///
/// JPEG has no alpha channel: pixels are written as RGB with alpha
/// dropped, so callers flatten transparent content first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl ImageCodec {
    /// Create a codec.
    pub fn new() -> Self {
        Self
    }
}

impl Codec for ImageCodec {
    fn decode(&self, bytes: &[u8]) -> CanvasResult<DecodedImage> {
        let format = image::guess_format(bytes).ok().and_then(format_from_image);
        let decoded = image::load_from_memory(bytes).map_err(|err| CanvasError::Decode {
            reason: err.to_string(),
        })?;

        debug!(
            target: "horizon_canvas::codec",
            width = decoded.width(),
            height = decoded.height(),
            format = ?format,
            "decoded image"
        );

        Ok(DecodedImage {
            pixels: PixelBuffer::from(decoded.into_rgba8()),
            format,
        })
    }

    fn encode(&self, pixels: &PixelBuffer, format: ImageFormat, quality: u8) -> CanvasResult<Vec<u8>> {
        let (width, height) = pixels.dimensions();
        let mut out = Vec::new();

        let result = match format {
            ImageFormat::Png => {
                PngEncoder::new(&mut out).write_image(pixels.as_raw(), width, height, ExtendedColorType::Rgba8)
            }
            ImageFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgba8(pixels.as_image().clone()).into_rgb8();
                JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).write_image(
                    rgb.as_raw(),
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )
            }
            ImageFormat::Bmp => {
                BmpEncoder::new(&mut out).write_image(pixels.as_raw(), width, height, ExtendedColorType::Rgba8)
            }
            ImageFormat::WebP => WebPEncoder::new_lossless(&mut out).write_image(
                pixels.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            ),
        };
        result.map_err(encode_error)?;

        debug!(
            target: "horizon_canvas::codec",
            %format,
            width,
            height,
            bytes = out.len(),
            "encoded image"
        );
        Ok(out)
    }
}

fn format_from_image(format: image::ImageFormat) -> Option<ImageFormat> {
    match format {
        image::ImageFormat::Png => Some(ImageFormat::Png),
        image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
        image::ImageFormat::Bmp => Some(ImageFormat::Bmp),
        image::ImageFormat::WebP => Some(ImageFormat::WebP),
        _ => None,
    }
}

fn encode_error(err: ImageError) -> CanvasError {
    CanvasError::Encode {
        reason: err.to_string(),
    }
}
