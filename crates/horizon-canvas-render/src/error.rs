//! Error types for the render crate.

use thiserror::Error;

use horizon_canvas_core::FilterKind;

/// Errors that can occur during GPU compositing.
///
/// Every variant is recoverable: callers are expected to fall back to the
/// CPU compositor in `horizon-canvas-core`.
#[derive(Error, Debug)]
pub enum RenderError {
    /// No suitable graphics adapter was found.
    #[error("no suitable graphics adapter found")]
    NoAdapter,

    /// Failed to request a graphics device.
    #[error("failed to request graphics device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// Invalid texture dimensions (zero or above the device limit).
    #[error("invalid texture dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The filter has no GPU implementation.
    #[error("filter not supported on the GPU: {0}")]
    UnsupportedFilter(FilterKind),

    /// Mapping the readback buffer failed.
    #[error("failed to read back texture: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    /// wgpu reported a validation error for a pipeline or submission.
    #[error("GPU validation error: {0}")]
    Validation(String),

    /// The device went away or the mapping callback never fired.
    #[error("GPU device lost")]
    DeviceLost,
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
