//! Core systems for Horizon Canvas.
//!
//! This crate holds the document model of the Horizon Canvas raster editor.
//! It has no GPU or filesystem dependencies:
//!
//! - **Pixel buffers**: copy-on-write RGBA8 rasters ([`PixelBuffer`])
//! - **Layer store**: ordered layers with opacity, blend mode and visibility
//! - **Filter engine**: non-destructive adjustments recomputed from a baseline
//! - **Compositing**: export flattening and the solo live preview
//! - **History**: bounded snapshot undo/redo
//! - **Tools**: brush, eraser, crop, move and scale
//! - **Session**: the context object tying these together
//!
//! # Example
//!
//! ```
//! use horizon_canvas_core::{BlendMode, EditorSession, FilterKind, LayerUpdate};
//!
//! let mut session = EditorSession::default();
//! let background = session.add_layer();
//! let overlay = session.add_layer();
//!
//! session.update_props(
//!     overlay,
//!     LayerUpdate::new().with_opacity(0.5).with_blend_mode(BlendMode::Multiply),
//! );
//! session.apply_filter(background, FilterKind::Brightness, -20.0);
//!
//! assert!(session.can_undo());
//! let flat = session.composite_for_export().unwrap();
//! assert_eq!(flat.dimensions(), (800, 500));
//! ```
//!
//! # Filters do not stack
//!
//! Each filter application recomputes the layer from the pixels it had
//! before its first filter. Applying contrast after brightness shows only
//! the contrast change. See [`filter`] for details.

pub mod blend;
pub mod buffer;
pub mod color;
pub mod composite;
pub mod config;
mod error;
pub mod filter;
pub mod history;
pub mod io;
mod layer;
pub mod logging;
pub mod preview;
pub mod session;
mod store;
pub mod tools;

pub use blend::{BlendMode, composite_pixel};
pub use buffer::PixelBuffer;
pub use composite::Background;
pub use config::EditorConfig;
pub use error::{CanvasError, CanvasResult};
pub use filter::FilterKind;
pub use history::{History, HistoryState};
pub use io::{Codec, DecodedImage, ImageFormat, Persistence};
pub use layer::{Layer, LayerId, LayerUpdate};
pub use preview::ViewTransform;
pub use session::EditorSession;
pub use store::{LayerStore, ReorderDirection};
pub use tools::{CanvasPoint, ToolAction};

/// Re-exports for downstream crates.
pub use glam;
pub use image;
