//! Horizon Canvas - a layered raster image editor core.
//!
//! This is the umbrella crate. It re-exports the document model from
//! `horizon-canvas-core`, the wgpu compositor from `horizon-canvas-render`,
//! and adds the pieces that touch the outside world:
//!
//! - [`Editor`]: a session with GPU compositing and automatic CPU fallback
//! - [`ImageCodec`]: PNG, JPEG, BMP and WebP through the `image` crate
//! - [`DirectoryPersistence`] and [`MemoryPersistence`]: export sinks
//!
//! # Example
//!
//! ```no_run
//! use horizon_canvas::{BlendMode, DirectoryPersistence, Editor, EditorConfig, ImageFormat, LayerUpdate};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut editor = Editor::new(EditorConfig::default());
//!     let bytes = std::fs::read("photo.png")?;
//!     editor.open_image(&bytes, "photo.png")?;
//!
//!     let overlay = editor.session_mut().add_layer();
//!     editor.session_mut().update_props(
//!         overlay,
//!         LayerUpdate::new().with_blend_mode(BlendMode::SoftLight).with_opacity(0.3),
//!     );
//!
//!     let mut exports = DirectoryPersistence::new("exports");
//!     if let Some(path) = editor.save_image(&mut exports, ImageFormat::Png)? {
//!         println!("saved {path}");
//!     }
//!     Ok(())
//! }
//! ```

mod codec;
mod editor;
mod persistence;

pub use codec::ImageCodec;
pub use editor::{Backend, Editor};
pub use persistence::{DirectoryPersistence, MemoryPersistence};

pub use horizon_canvas_core::*;

/// GPU compositing module.
pub mod render {
    pub use horizon_canvas_render::*;
}
