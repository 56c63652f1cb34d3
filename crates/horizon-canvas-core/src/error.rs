//! Error types for the canvas core.

use thiserror::Error;

/// Errors that can occur during canvas operations.
///
/// Most editing operations never fail: unknown layer ids are no-ops and
/// out-of-range values are clamped. Errors are reserved for data that
/// crosses a collaborator boundary (decoding, encoding, persistence) and
/// for malformed input that cannot be clamped into something meaningful.
#[derive(Error, Debug)]
pub enum CanvasError {
    /// The codec could not decode the supplied bytes.
    #[error("failed to decode image: {reason}")]
    Decode { reason: String },

    /// The codec could not encode a pixel buffer.
    #[error("failed to encode image: {reason}")]
    Encode { reason: String },

    /// The persistence collaborator rejected the write.
    #[error("failed to persist {filename}: {reason}")]
    Persistence { filename: String, reason: String },

    /// Raw pixel data does not match the declared dimensions.
    #[error("invalid buffer: expected {expected} bytes for {width}x{height}, got {actual}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Zero width or height.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// A filter name that is not one of the supported adjustments.
    #[error("unknown filter: {0}")]
    UnknownFilter(String),

    /// A blend mode name that is not supported.
    #[error("unknown blend mode: {0}")]
    UnknownBlendMode(String),

    /// The editor configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type for canvas operations.
pub type CanvasResult<T> = Result<T, CanvasError>;
