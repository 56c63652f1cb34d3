//! Copy-on-write RGBA8 pixel storage.
//!
//! [`PixelBuffer`] is the unit of pixel ownership in the editor. Every layer
//! holds one as its current raster (and, after the first filter, another as
//! its baseline), and every history snapshot holds clones of them.
//!
//! Clones share storage through an [`Arc`]; the first mutation of a shared
//! buffer detaches a private copy via [`Arc::make_mut`]. A snapshot taken
//! before an edit therefore never observes that edit, and restoring a
//! snapshot never lets later edits leak back into history.
//!
//! Pixels are stored row-major with straight (non-premultiplied) alpha.

use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::error::{CanvasError, CanvasResult};

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Opaque white.
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Fully transparent black.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// An RGBA8 raster with copy-on-write sharing.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    inner: Arc<RgbaImage>,
}

impl PixelBuffer {
    /// Create a fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, TRANSPARENT)
    }

    /// Create a buffer filled with opaque white.
    pub fn white(width: u32, height: u32) -> Self {
        Self::filled(width, height, WHITE)
    }

    /// Create a buffer filled with a single color.
    pub fn filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        Self::from_image(RgbaImage::from_pixel(width, height, color))
    }

    /// Wrap an existing `image` raster.
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            inner: Arc::new(image),
        }
    }

    /// Create a buffer from raw RGBA bytes in row-major order.
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> CanvasResult<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        let actual = data.len();
        RgbaImage::from_raw(width, height, data)
            .filter(|_| actual == expected)
            .map(Self::from_image)
            .ok_or(CanvasError::BufferSize {
                width,
                height,
                expected,
                actual,
            })
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    /// `(width, height)`.
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    /// Whether the buffer has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Read one pixel, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.inner.get_pixel_checked(x, y).map(|p| p.0)
    }

    /// Raw RGBA bytes.
    #[inline]
    pub fn as_raw(&self) -> &[u8] {
        self.inner.as_raw()
    }

    /// Borrow the underlying raster.
    #[inline]
    pub fn as_image(&self) -> &RgbaImage {
        &self.inner
    }

    /// Mutable access to the raster, detaching from any other holder first.
    pub fn image_mut(&mut self) -> &mut RgbaImage {
        Arc::make_mut(&mut self.inner)
    }

    /// Take the raster out, copying only if it is still shared.
    pub fn into_image(self) -> RgbaImage {
        Arc::unwrap_or_clone(self.inner)
    }

    /// Whether two buffers currently share the same storage.
    pub fn shares_storage(&self, other: &PixelBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Copy a rectangle out of this buffer.
    ///
    /// The rectangle is clipped to the buffer bounds.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> PixelBuffer {
        let view = image::imageops::crop_imm(self.as_image(), x, y, width, height);
        Self::from_image(view.to_image())
    }

    /// Smallest rectangle `(x, y, width, height)` containing every pixel with
    /// non-zero alpha, or `None` for a fully transparent buffer.
    pub fn visible_bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let mut min_x = u32::MAX;
        let mut min_y = u32::MAX;
        let mut max_x = 0;
        let mut max_y = 0;
        let mut found = false;

        for (x, y, pixel) in self.inner.enumerate_pixels() {
            if pixel.0[3] > 0 {
                found = true;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }

        found.then(|| (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        Self::from_image(image)
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("shared", &(Arc::strong_count(&self.inner) > 1))
            .finish()
    }
}
