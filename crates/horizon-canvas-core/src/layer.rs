//! Layers: named, orderable rasters with opacity, blend and visibility state.

use std::collections::BTreeMap;

use crate::blend::BlendMode;
use crate::buffer::PixelBuffer;
use crate::filter::FilterKind;

/// A unique identifier for a layer.
///
/// Ids are allocated by the editor session from a monotonically increasing
/// counter that lives outside the undoable state, so an id is never handed
/// out twice within a session, even across undo and redo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl LayerId {
    /// Create a new layer ID.
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer-{}", self.0)
    }
}

/// A partial update of a layer's display properties.
///
/// Unset fields are left unchanged.
///
/// ```
/// use horizon_canvas_core::{BlendMode, LayerUpdate};
///
/// let update = LayerUpdate::new()
///     .with_opacity(0.5)
///     .with_blend_mode(BlendMode::Multiply);
/// assert_eq!(update.visible, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New visibility flag.
    pub visible: Option<bool>,
    /// New opacity, clamped to `0.0..=1.0` when applied.
    pub opacity: Option<f32>,
    /// New blend mode.
    pub blend_mode: Option<BlendMode>,
}

impl LayerUpdate {
    /// An update that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the visibility flag.
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    /// Set the opacity.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    /// Set the blend mode.
    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = Some(blend_mode);
        self
    }

    /// Whether applying this update would change anything at all.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.visible.is_none()
            && self.opacity.is_none()
            && self.blend_mode.is_none()
    }
}

/// One raster layer of the document.
#[derive(Clone, PartialEq)]
pub struct Layer {
    id: LayerId,
    name: String,
    visible: bool,
    opacity: f32,
    blend_mode: BlendMode,
    /// Size the layer was created with.
    width: u32,
    height: u32,
    current: PixelBuffer,
    /// Written once, on the first filter application.
    baseline: Option<PixelBuffer>,
    filters: BTreeMap<FilterKind, f32>,
}

impl Layer {
    /// Create an opaque white layer.
    pub(crate) fn new(id: LayerId, name: impl Into<String>, width: u32, height: u32) -> Self {
        Self::with_buffer(id, name, PixelBuffer::white(width, height))
    }

    /// Create a layer around existing pixels.
    pub(crate) fn with_buffer(id: LayerId, name: impl Into<String>, buffer: PixelBuffer) -> Self {
        let (width, height) = buffer.dimensions();
        Self {
            id,
            name: name.into(),
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            width,
            height,
            current: buffer,
            baseline: None,
            filters: BTreeMap::new(),
        }
    }

    /// Get the layer ID.
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the layer takes part in compositing.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Layer opacity in `0.0..=1.0`.
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Blend mode used when compositing.
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Size the layer was created with.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The pixels currently shown for this layer.
    pub fn current(&self) -> &PixelBuffer {
        &self.current
    }

    /// The pre-filter pixels, present once a filter has been applied.
    pub fn baseline(&self) -> Option<&PixelBuffer> {
        self.baseline.as_ref()
    }

    /// Last value set for each filter, for display purposes.
    ///
    /// Only the most recently applied filter is realized in
    /// [`current`](Self::current).
    pub fn filter_values(&self) -> &BTreeMap<FilterKind, f32> {
        &self.filters
    }

    /// Last value set for one filter, or its neutral value.
    pub fn filter_value(&self, kind: FilterKind) -> f32 {
        self.filters
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.neutral())
    }

    pub(crate) fn apply_update(&mut self, update: &LayerUpdate) {
        if let Some(name) = &update.name {
            self.name.clone_from(name);
        }
        if let Some(visible) = update.visible {
            self.visible = visible;
        }
        if let Some(opacity) = update.opacity {
            self.opacity = if opacity.is_nan() {
                self.opacity
            } else {
                opacity.clamp(0.0, 1.0)
            };
        }
        if let Some(blend_mode) = update.blend_mode {
            self.blend_mode = blend_mode;
        }
    }

    pub(crate) fn set_current(&mut self, buffer: PixelBuffer) {
        self.current = buffer;
    }

    /// Record the baseline if this is the first filter application.
    ///
    /// Returns the baseline to recompute from.
    pub(crate) fn ensure_baseline(&mut self) -> &PixelBuffer {
        self.baseline.get_or_insert_with(|| self.current.clone())
    }

    pub(crate) fn filters_mut(&mut self) -> &mut BTreeMap<FilterKind, f32> {
        &mut self.filters
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("visible", &self.visible)
            .field("opacity", &self.opacity)
            .field("blend_mode", &self.blend_mode)
            .field("buffer", &self.current.dimensions())
            .field("has_baseline", &self.baseline.is_some())
            .finish()
    }
}
