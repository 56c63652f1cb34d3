//! GPU compositing backend for Horizon Canvas.
//!
//! This crate runs the layer compositor and the point filters of
//! `horizon-canvas-core` on the GPU through wgpu. It renders headless into
//! offscreen textures and reads the result back into a
//! [`PixelBuffer`](horizon_canvas_core::PixelBuffer); no window or surface
//! is involved.
//!
//! GPU output matches the CPU path to within one 8-bit unit per channel.
//! Every failure is reported as a [`RenderError`] so callers can fall back
//! to the CPU compositor.
//!
//! # Getting Started
//!
//! ```no_run
//! use horizon_canvas_core::composite::Background;
//! use horizon_canvas_core::{FilterKind, PixelBuffer};
//! use horizon_canvas_render::{GpuCompositor, GpuLayer, GraphicsConfig, GraphicsContext};
//!
//! # fn example() -> horizon_canvas_render::RenderResult<()> {
//! let ctx = GraphicsContext::new(GraphicsConfig::default())?;
//! let compositor = GpuCompositor::new(ctx)?;
//!
//! let photo = PixelBuffer::white(800, 500);
//! let flat = compositor.composite_layers(
//!     &[GpuLayer::new(&photo).with_filter(FilterKind::Brightness, -20.0)],
//!     800,
//!     500,
//!     Background::Transparent,
//! )?;
//! assert_eq!(flat.dimensions(), (800, 500));
//! # Ok(())
//! # }
//! ```

mod capture;
mod compositor;
mod context;
mod error;

// Core infrastructure
pub use context::{GraphicsConfig, GraphicsContext};
pub use error::{RenderError, RenderResult};

// Compositing
pub use capture::{BufferDimensions, read_texture, upload_texture};
pub use compositor::{GpuCompositor, GpuLayer, PipelineVariant};

// Re-export wgpu types that users commonly need
pub use wgpu;
