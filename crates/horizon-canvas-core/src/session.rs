//! The editor session: layer store, history and view in one context object.
//!
//! All editing goes through [`EditorSession`]. Each operation that changes
//! the document pushes a history snapshot once it has completed, except
//! layer creation. Operations on unknown layer ids change nothing, push
//! nothing and report `false` or `None`.

use tracing::{debug, info};

use crate::buffer::PixelBuffer;
use crate::composite;
use crate::config::EditorConfig;
use crate::error::CanvasResult;
use crate::filter::{self, FilterKind};
use crate::history::History;
use crate::io::{self, Codec, ImageFormat, Persistence};
use crate::layer::{Layer, LayerId, LayerUpdate};
use crate::preview::{self, ViewTransform};
use crate::store::{LayerStore, ReorderDirection};
use crate::tools::{self, ToolAction};
use crate::logging::targets;

/// One open document.
#[derive(Debug, Clone)]
pub struct EditorSession {
    config: EditorConfig,
    store: LayerStore,
    history: History,
    view: ViewTransform,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl EditorSession {
    /// Create an empty session.
    pub fn new(config: EditorConfig) -> Self {
        info!(
            target: targets::SESSION,
            width = config.canvas_width,
            height = config.canvas_height,
            history_capacity = config.history_capacity,
            "created editor session"
        );
        Self {
            history: History::new(config.history_capacity),
            config,
            store: LayerStore::new(),
            view: ViewTransform::IDENTITY,
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Canvas size used for new layers and tool output.
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.config.canvas_width, self.config.canvas_height)
    }

    /// The layers.
    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    /// Undo history.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Look up a layer.
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.store.layer(id)
    }

    /// The active layer id.
    pub fn active_layer(&self) -> Option<LayerId> {
        self.store.active_id()
    }

    fn snapshot(&mut self, label: &'static str) {
        self.history.push(self.store.capture().with_label(label));
    }

    // ========================================================================
    // Layers
    // ========================================================================

    /// Create a white layer and make it active. Does not snapshot.
    pub fn create_layer(&mut self, name: impl Into<String>, width: u32, height: u32) -> LayerId {
        self.store.create_layer(name, width, height)
    }

    /// Create a canvas-sized layer named `"Layer N"`. Does not snapshot.
    pub fn add_layer(&mut self) -> LayerId {
        let name = format!("Layer {}", self.store.len() + 1);
        let (width, height) = self.canvas_size();
        self.store.create_layer(name, width, height)
    }

    /// Delete a layer.
    pub fn delete_layer(&mut self, id: LayerId) -> bool {
        let changed = self.store.delete_layer(id);
        if changed {
            self.snapshot("Delete layer");
        }
        changed
    }

    /// Select the active layer.
    pub fn set_active(&mut self, id: LayerId) -> bool {
        let changed = self.store.set_active(id);
        if changed {
            self.snapshot("Select layer");
        }
        changed
    }

    /// Change visibility, opacity, blend mode or name.
    pub fn update_props(&mut self, id: LayerId, update: LayerUpdate) -> bool {
        let changed = self.store.update_props(id, &update);
        if changed {
            self.snapshot("Layer properties");
        }
        changed
    }

    /// Move a layer up or down the stack.
    pub fn reorder(&mut self, id: LayerId, direction: ReorderDirection) -> bool {
        let changed = self.store.reorder(id, direction);
        if changed {
            self.snapshot("Reorder layer");
        }
        changed
    }

    /// Install a new current buffer for a layer.
    pub fn replace_buffer(&mut self, id: LayerId, buffer: PixelBuffer) -> bool {
        let changed = self.store.replace_buffer(id, buffer);
        if changed {
            self.snapshot("Edit pixels");
        }
        changed
    }

    // ========================================================================
    // Filters
    // ========================================================================

    /// Recompute a layer from its baseline with one filter.
    ///
    /// Returns the new current buffer, or `None` for an unknown layer.
    pub fn apply_filter(&mut self, id: LayerId, kind: FilterKind, value: f32) -> Option<PixelBuffer> {
        let Some(layer) = self.store.layer_mut(id) else {
            debug!(target: targets::SESSION, id = id.id(), "apply_filter: unknown layer");
            return None;
        };
        let result = filter::apply_filter(layer, kind, value).clone();
        self.snapshot("Apply filter");
        Some(result)
    }

    /// [`apply_filter`](Self::apply_filter) with the filter given by name.
    ///
    /// An unknown name is an error; an unknown layer is still `Ok(None)`.
    pub fn apply_filter_named(&mut self, id: LayerId, name: &str, value: f32) -> CanvasResult<Option<PixelBuffer>> {
        let kind = name.parse::<FilterKind>()?;
        Ok(self.apply_filter(id, kind, value))
    }

    /// Restore a layer's baseline. Returns `false` if it was never filtered.
    pub fn reset_filters(&mut self, id: LayerId) -> bool {
        let changed = self.store.layer_mut(id).is_some_and(filter::reset_filters);
        if changed {
            self.snapshot("Reset filters");
        }
        changed
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Step back one snapshot.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(state) => {
                self.store.restore(state);
                true
            }
            None => false,
        }
    }

    /// Step forward one snapshot.
    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(state) => {
                self.store.restore(state);
                true
            }
            None => false,
        }
    }

    /// Whether [`undo`](Self::undo) would do anything.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether [`redo`](Self::redo) would do anything.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ========================================================================
    // Compositing
    // ========================================================================

    /// Flatten all visible layers. `None` when there are no layers.
    pub fn composite_for_export(&self) -> Option<PixelBuffer> {
        composite::flatten(self.store.layers(), self.config.background)
    }

    /// Draw the active layer alone over white at the current view.
    ///
    /// Returns `None` unless `id` is the active layer.
    pub fn render_preview(&self, id: LayerId) -> Option<PixelBuffer> {
        if self.store.active_id() != Some(id) {
            debug!(target: targets::SESSION, id = id.id(), "preview: not the active layer");
            return None;
        }
        let layer = self.store.layer(id)?;
        let (width, height) = self.canvas_size();
        Some(preview::render_layer_preview(layer, width, height, &self.view))
    }

    /// Preview the active layer with `kind` at `value` without committing it.
    ///
    /// The filter is evaluated from the layer's baseline, as
    /// [`apply_filter`](Self::apply_filter) would, but neither the layer nor
    /// the history changes.
    pub fn preview_filter(&self, id: LayerId, kind: FilterKind, value: f32) -> Option<PixelBuffer> {
        if self.store.active_id() != Some(id) {
            debug!(target: targets::SESSION, id = id.id(), "preview: not the active layer");
            return None;
        }
        let layer = self.store.layer(id)?;
        let (width, height) = self.canvas_size();
        if !layer.is_visible() {
            return Some(PixelBuffer::white(width, height));
        }

        let source = layer.baseline().unwrap_or_else(|| layer.current());
        let filtered = filter::render_filter(source, kind, value);
        Some(preview::render_pixels_preview(
            &filtered,
            layer.blend_mode(),
            layer.opacity(),
            width,
            height,
            &self.view,
        ))
    }

    /// Current zoom and pan.
    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    /// Replace the zoom and pan. Does not snapshot.
    pub fn set_view(&mut self, view: ViewTransform) {
        self.view = view;
    }

    // ========================================================================
    // Tools
    // ========================================================================

    /// Apply a tool gesture to the active layer.
    ///
    /// Pixel edits snapshot; zoom and pan only change the view. Returns
    /// `false` when nothing changed (no active layer, crop too small).
    pub fn apply_tool(&mut self, action: &ToolAction) -> bool {
        let (width, height) = self.canvas_size();
        let target = self.store.active_layer().map(|layer| (layer.id(), layer.current()));

        let edited = match (action, target) {
            (ToolAction::Zoom { factor }, _) => {
                self.view.zoom_by(*factor);
                return true;
            }
            (ToolAction::Pan { delta }, _) => {
                self.view.pan_by(*delta);
                return true;
            }
            (_, None) => {
                debug!(target: targets::TOOLS, "no active layer");
                return false;
            }
            (ToolAction::Brush { points, size, color }, Some((id, current))) => {
                Some((id, tools::brush_stroke(current, points, *size, *color)))
            }
            (ToolAction::Eraser { points, size }, Some((id, current))) => {
                Some((id, tools::eraser_stroke(current, points, *size)))
            }
            (ToolAction::Crop { from, to }, Some((id, current))) => {
                tools::crop(current, *from, *to, width, height).map(|buffer| (id, buffer))
            }
            (ToolAction::Move { dx, dy }, Some((id, current))) => {
                Some((id, tools::move_content(current, *dx, *dy, width, height)))
            }
            (ToolAction::Scale { factor }, Some((id, current))) => {
                Some((id, tools::scale_content(current, *factor, width, height)))
            }
        };

        match edited {
            Some((id, buffer)) => self.replace_buffer(id, buffer),
            None => false,
        }
    }

    // ========================================================================
    // Import / export
    // ========================================================================

    /// Decode an image, fit it onto a white canvas and add it as a new
    /// active layer named `name`. Snapshots on success.
    ///
    /// A decode failure is returned unchanged and leaves the session as it
    /// was.
    pub fn open_image<C: Codec + ?Sized>(&mut self, codec: &C, bytes: &[u8], name: &str) -> CanvasResult<LayerId> {
        let decoded = codec.decode(bytes)?;
        let (width, height) = self.canvas_size();
        let fitted = tools::fit_to_canvas(&decoded.pixels, width, height);
        let id = self.store.push_layer(name, fitted);

        info!(
            target: targets::SESSION,
            id = id.id(),
            name,
            source_width = decoded.width(),
            source_height = decoded.height(),
            "opened image"
        );
        self.snapshot("Open image");
        Ok(id)
    }

    /// Flatten, encode and persist the document.
    ///
    /// Returns `Ok(None)` when there is nothing to save.
    pub fn save_image<C, P>(&self, codec: &C, persistence: &mut P, format: ImageFormat) -> CanvasResult<Option<String>>
    where
        C: Codec + ?Sized,
        P: Persistence + ?Sized,
    {
        let Some(pixels) = self.composite_for_export() else {
            return Ok(None);
        };
        io::save_pixels(codec, persistence, &pixels, format, self.config.export_quality).map(Some)
    }

    /// The active layer cropped to its non-transparent pixels.
    ///
    /// Formats without alpha get the pixels flattened onto white. `None`
    /// when there is no active layer or it is fully transparent.
    pub fn active_layer_pixels(&self, format: ImageFormat) -> Option<PixelBuffer> {
        let current = self.store.active_layer()?.current();
        let (x, y, width, height) = current.visible_bounds()?;
        let trimmed = current.crop(x, y, width, height);
        if format.supports_alpha() {
            return Some(trimmed);
        }

        Some(composite::onto_white(&trimmed))
    }

    /// Encode the active layer cropped to its non-transparent pixels.
    pub fn export_active_layer<C: Codec + ?Sized>(&self, codec: &C, format: ImageFormat) -> CanvasResult<Option<Vec<u8>>> {
        self.active_layer_pixels(format)
            .map(|pixels| codec.encode(&pixels, format, self.config.export_quality))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_create_does_not_snapshot() {
        let mut session = EditorSession::default();
        let id = session.add_layer();
        assert!(session.history().is_empty());
        assert_eq!(session.layer(id).unwrap().name(), "Layer 1");
        assert_eq!(session.layer(id).unwrap().size(), (800, 500));
    }

    #[test]
    fn test_unknown_id_does_not_snapshot() {
        let mut session = EditorSession::default();
        let id = session.add_layer();
        session.delete_layer(id);
        assert_eq!(session.history().len(), 1);

        assert!(!session.update_props(id, LayerUpdate::new().with_opacity(0.5)));
        assert!(session.apply_filter(id, FilterKind::Hue, 10.0).is_none());
        assert!(!session.reset_filters(id));
        assert!(!session.set_active(id));
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_apply_filter_named_rejects_unknown() {
        let mut session = EditorSession::default();
        let id = session.create_layer("a", 2, 2);
        assert!(session.apply_filter_named(id, "vignette", 1.0).is_err());
        assert!(session.apply_filter_named(id, "grayscale", 100.0).unwrap().is_some());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_preview_only_for_active() {
        let mut session = EditorSession::new(EditorConfig::new().with_canvas_size(4, 4));
        let first = session.add_layer();
        let second = session.add_layer();
        assert!(session.render_preview(first).is_none());
        assert_eq!(session.render_preview(second).unwrap().dimensions(), (4, 4));
    }

    #[test]
    fn test_view_tools_do_not_snapshot() {
        let mut session = EditorSession::default();
        session.add_layer();
        assert!(session.apply_tool(&ToolAction::Zoom { factor: 2.0 }));
        assert!(session.apply_tool(&ToolAction::Pan { delta: Vec2::new(5.0, 0.0) }));
        assert_eq!(session.view().scale(), 2.0);
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_small_crop_changes_nothing() {
        let mut session = EditorSession::default();
        session.add_layer();
        let crop = ToolAction::Crop {
            from: Vec2::new(0.0, 0.0),
            to: Vec2::new(5.0, 5.0),
        };
        assert!(!session.apply_tool(&crop));
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_tool_without_layer() {
        let mut session = EditorSession::default();
        assert!(!session.apply_tool(&ToolAction::Move { dx: 1, dy: 1 }));
    }

    #[test]
    fn test_active_layer_pixels_trims_and_flattens() {
        let mut session = EditorSession::new(EditorConfig::new().with_canvas_size(10, 10));
        let id = session.add_layer();
        let mut pixels = PixelBuffer::new(10, 10);
        pixels.image_mut().put_pixel(3, 4, image::Rgba([0, 0, 0, 128]));
        pixels.image_mut().put_pixel(5, 4, image::Rgba([0, 0, 0, 255]));
        session.replace_buffer(id, pixels);

        let png = session.active_layer_pixels(ImageFormat::Png).unwrap();
        assert_eq!(png.dimensions(), (3, 1));
        assert_eq!(png.pixel(1, 0), Some([0, 0, 0, 0]));

        let jpeg = session.active_layer_pixels(ImageFormat::Jpeg).unwrap();
        assert_eq!(jpeg.pixel(1, 0), Some([255, 255, 255, 255]));
        assert_eq!(jpeg.pixel(0, 0), Some([127, 127, 127, 255]));
    }

    #[test]
    fn test_transparent_layer_has_nothing_to_export() {
        let mut session = EditorSession::default();
        let id = session.add_layer();
        session.replace_buffer(id, PixelBuffer::new(8, 8));
        assert!(session.active_layer_pixels(ImageFormat::Png).is_none());
    }

    #[test]
    fn test_preview_filter_commits_nothing() {
        let mut session = EditorSession::new(EditorConfig::new().with_canvas_size(6, 4));
        let id = session.add_layer();
        session.replace_buffer(id, PixelBuffer::filled(6, 4, image::Rgba([100, 100, 100, 255])));
        let history_len = session.history().len();

        let preview = session.preview_filter(id, FilterKind::Brightness, 20.0).unwrap();
        assert_eq!(preview.pixel(2, 2), Some([151, 151, 151, 255]));
        assert_eq!(session.layer(id).unwrap().current().pixel(2, 2), Some([100, 100, 100, 255]));
        assert!(session.layer(id).unwrap().baseline().is_none());
        assert_eq!(session.history().len(), history_len);
    }
}
