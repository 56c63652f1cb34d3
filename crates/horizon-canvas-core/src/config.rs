//! Editor configuration.

use serde::Deserialize;

use crate::composite::Background;
use crate::error::CanvasResult;
use crate::history::DEFAULT_CAPACITY;

/// Settings for an editor session.
///
/// Every field has a default, so a TOML file only needs the keys it
/// changes:
///
/// ```
/// use horizon_canvas_core::EditorConfig;
///
/// let config = EditorConfig::from_toml_str("canvas_width = 1024").unwrap();
/// assert_eq!(config.canvas_width, 1024);
/// assert_eq!(config.canvas_height, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Width of new layers and tool output.
    pub canvas_width: u32,
    /// Height of new layers and tool output.
    pub canvas_height: u32,
    /// Number of undo snapshots kept.
    pub history_capacity: usize,
    /// Export background.
    pub background: Background,
    /// Try the GPU compositor before the CPU one.
    pub prefer_gpu: bool,
    /// Quality for lossy exports, `1..=100`.
    pub export_quality: u8,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            canvas_width: 800,
            canvas_height: 500,
            history_capacity: DEFAULT_CAPACITY,
            background: Background::Transparent,
            prefer_gpu: true,
            export_quality: 90,
        }
    }
}

impl EditorConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> CanvasResult<Self> {
        Ok(toml::from_str::<Self>(source)?.sanitized())
    }

    /// Set the canvas size.
    pub fn with_canvas_size(mut self, width: u32, height: u32) -> Self {
        self.canvas_width = width;
        self.canvas_height = height;
        self.sanitized()
    }

    /// Set the history capacity.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self.sanitized()
    }

    /// Set the export background.
    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    /// Enable or disable the GPU compositor.
    pub fn with_gpu(mut self, prefer_gpu: bool) -> Self {
        self.prefer_gpu = prefer_gpu;
        self
    }

    /// Set the lossy export quality.
    pub fn with_export_quality(mut self, quality: u8) -> Self {
        self.export_quality = quality;
        self.sanitized()
    }

    fn sanitized(mut self) -> Self {
        self.canvas_width = self.canvas_width.max(1);
        self.canvas_height = self.canvas_height.max(1);
        self.history_capacity = self.history_capacity.max(1);
        self.export_quality = self.export_quality.clamp(1, 100);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!((config.canvas_width, config.canvas_height), (800, 500));
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.background, Background::Transparent);
        assert!(config.prefer_gpu);
    }

    #[test]
    fn test_from_toml() {
        let config = EditorConfig::from_toml_str(
            r#"
            history_capacity = 10
            background = "white"
            prefer_gpu = false
            "#,
        )
        .unwrap();
        assert_eq!(config.history_capacity, 10);
        assert_eq!(config.background, Background::White);
        assert!(!config.prefer_gpu);
        assert_eq!(config.canvas_width, 800);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(EditorConfig::from_toml_str("canvas_width = \"wide\"").is_err());
    }

    #[test]
    fn test_builder_sanitizes() {
        let config = EditorConfig::new()
            .with_canvas_size(0, 10)
            .with_history_capacity(0)
            .with_export_quality(0);
        assert_eq!(config.canvas_width, 1);
        assert_eq!(config.history_capacity, 1);
        assert_eq!(config.export_quality, 1);
    }
}
