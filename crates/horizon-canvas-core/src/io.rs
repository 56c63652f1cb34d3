//! Collaborator interfaces for decoding, encoding and persisting images.
//!
//! The core never touches the filesystem or an image format directly.
//! Implementations live outside the core (the `horizon-canvas` crate ships
//! an `image`-crate codec and directory/in-memory persistence).

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::composite;
use crate::error::{CanvasError, CanvasResult};
use crate::logging::targets;

/// Encoded image formats understood by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
    WebP,
}

impl ImageFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Bmp => "bmp",
            ImageFormat::WebP => "webp",
        }
    }

    /// MIME type.
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::WebP => "image/webp",
        }
    }

    /// Whether the format can store an alpha channel.
    pub fn supports_alpha(self) -> bool {
        !matches!(self, ImageFormat::Jpeg)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "bmp" => Ok(ImageFormat::Bmp),
            "webp" => Ok(ImageFormat::WebP),
            other => Err(CanvasError::Encode {
                reason: format!("unsupported format: {other}"),
            }),
        }
    }
}

/// The result of decoding an encoded image.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Straight-alpha RGBA8 pixels.
    pub pixels: PixelBuffer,
    /// Format the bytes were in, if recognized.
    pub format: Option<ImageFormat>,
}

impl DecodedImage {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Turns encoded bytes into pixels and back.
pub trait Codec {
    /// Decode an encoded image.
    ///
    /// Failures must be reported as [`CanvasError::Decode`].
    fn decode(&self, bytes: &[u8]) -> CanvasResult<DecodedImage>;

    /// Encode pixels. `quality` in `1..=100` applies to lossy formats only.
    fn encode(&self, pixels: &PixelBuffer, format: ImageFormat, quality: u8) -> CanvasResult<Vec<u8>>;
}

/// Stores encoded bytes somewhere.
pub trait Persistence {
    /// Store `bytes` under `filename`, returning where they ended up.
    fn persist(&mut self, bytes: &[u8], filename: &str) -> CanvasResult<String>;
}

impl<C: Codec + ?Sized> Codec for &C {
    fn decode(&self, bytes: &[u8]) -> CanvasResult<DecodedImage> {
        (**self).decode(bytes)
    }

    fn encode(&self, pixels: &PixelBuffer, format: ImageFormat, quality: u8) -> CanvasResult<Vec<u8>> {
        (**self).encode(pixels, format, quality)
    }
}

impl<P: Persistence + ?Sized> Persistence for &mut P {
    fn persist(&mut self, bytes: &[u8], filename: &str) -> CanvasResult<String> {
        (**self).persist(bytes, filename)
    }
}

/// Name a saved export the way the editor always has:
/// `edited-image-<unix millis>.<ext>`.
pub fn export_filename(unix_millis: u128, format: ImageFormat) -> String {
    format!("edited-image-{unix_millis}.{}", format.extension())
}

/// Encode `pixels` and hand them to `persistence` under a fresh
/// [`export_filename`]. Returns the location reported by the sink.
///
/// Formats without alpha are flattened onto white first.
pub fn save_pixels<C, P>(
    codec: &C,
    persistence: &mut P,
    pixels: &PixelBuffer,
    format: ImageFormat,
    quality: u8,
) -> CanvasResult<String>
where
    C: Codec + ?Sized,
    P: Persistence + ?Sized,
{
    let bytes = if format.supports_alpha() {
        codec.encode(pixels, format, quality)?
    } else {
        codec.encode(&composite::onto_white(pixels), format, quality)?
    };
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let filename = export_filename(millis, format);
    let location = persistence.persist(&bytes, &filename)?;

    tracing::info!(
        target: targets::SESSION,
        filename = %filename,
        location = %location,
        bytes = bytes.len(),
        "saved image"
    );
    Ok(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records the pixels it is asked to encode.
    #[derive(Default)]
    struct RecordingCodec {
        encoded: RefCell<Vec<PixelBuffer>>,
    }

    impl Codec for RecordingCodec {
        fn decode(&self, _bytes: &[u8]) -> CanvasResult<DecodedImage> {
            Err(CanvasError::Decode {
                reason: "not supported".to_string(),
            })
        }

        fn encode(&self, pixels: &PixelBuffer, _format: ImageFormat, _quality: u8) -> CanvasResult<Vec<u8>> {
            self.encoded.borrow_mut().push(pixels.clone());
            Ok(vec![1, 2, 3])
        }
    }

    #[derive(Default)]
    struct NullSink {
        names: Vec<String>,
    }

    impl Persistence for NullSink {
        fn persist(&mut self, _bytes: &[u8], filename: &str) -> CanvasResult<String> {
            self.names.push(filename.to_string());
            Ok(filename.to_string())
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JPEG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!(".png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert!("tiff".parse::<ImageFormat>().is_err());
        assert!(!ImageFormat::Jpeg.supports_alpha());
    }

    #[test]
    fn test_export_filename() {
        assert_eq!(
            export_filename(1_700_000_000_123, ImageFormat::Jpeg),
            "edited-image-1700000000123.jpg"
        );
    }

    #[test]
    fn test_save_without_alpha_flattens_onto_white() {
        let codec = RecordingCodec::default();
        let mut sink = NullSink::default();
        let mut pixels = PixelBuffer::new(4, 4);
        pixels.image_mut().put_pixel(1, 1, image::Rgba([255, 0, 0, 255]));

        let location = save_pixels(&codec, &mut sink, &pixels, ImageFormat::Jpeg, 90).unwrap();
        assert!(location.ends_with(".jpg"));

        let encoded = codec.encoded.borrow();
        assert_eq!(encoded[0].pixel(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(encoded[0].pixel(1, 1), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_save_with_alpha_keeps_transparency() {
        let codec = RecordingCodec::default();
        let mut sink = NullSink::default();
        let pixels = PixelBuffer::new(4, 4);

        save_pixels(&codec, &mut sink, &pixels, ImageFormat::Png, 90).unwrap();
        assert_eq!(codec.encoded.borrow()[0].pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(sink.names.len(), 1);
    }
}
