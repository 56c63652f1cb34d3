//! The editor front end: a session plus an optional GPU compositor.
//!
//! [`Editor`] forwards document operations to its
//! [`EditorSession`](horizon_canvas_core::EditorSession) and routes
//! compositing through the GPU when one is available. GPU support is a
//! capability flag: if the device cannot be created, or a GPU call fails
//! later, the flag is cleared and the CPU engine takes over for the rest of
//! the editor's life.

use horizon_canvas_core::composite::Background;
use horizon_canvas_core::{
    CanvasResult, EditorConfig, EditorSession, FilterKind, ImageFormat, LayerId, Persistence, PixelBuffer,
};
use horizon_canvas_render::{GpuCompositor, GpuLayer, GraphicsConfig, GraphicsContext, RenderError};
use tracing::{debug, info, warn};

use crate::codec::ImageCodec;

/// Where compositing currently runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// wgpu compositor.
    Gpu,
    /// rayon-parallel CPU compositor.
    Cpu,
}

/// An editor session with GPU-accelerated compositing and CPU fallback.
///
/// # Example
///
/// ```no_run
/// use horizon_canvas::{Editor, EditorConfig, FilterKind, ImageFormat, MemoryPersistence};
///
/// let mut editor = Editor::new(EditorConfig::default());
/// let id = editor.session_mut().add_layer();
/// editor.session_mut().apply_filter(id, FilterKind::Contrast, 25.0);
///
/// let mut sink = MemoryPersistence::new();
/// let saved = editor.save_image(&mut sink, ImageFormat::Png).unwrap();
/// assert!(saved.is_some());
/// ```
pub struct Editor {
    session: EditorSession,
    codec: ImageCodec,
    gpu: Option<GpuCompositor>,
}

impl Editor {
    /// Create an editor, acquiring a GPU if the configuration prefers one.
    ///
    /// GPU initialization failure is not an error: it is logged and the
    /// editor composites on the CPU.
    pub fn new(config: EditorConfig) -> Self {
        Self::with_graphics(config, GraphicsConfig::default())
    }

    /// Like [`new`](Self::new), with explicit adapter selection.
    pub fn with_graphics(config: EditorConfig, graphics: GraphicsConfig) -> Self {
        let gpu = if config.prefer_gpu {
            Self::init_gpu(graphics)
        } else {
            None
        };
        Self::with_gpu(config, gpu)
    }

    /// Create an editor that never touches the GPU.
    pub fn cpu_only(config: EditorConfig) -> Self {
        Self::with_gpu(config.with_gpu(false), None)
    }

    /// Create an editor around an existing compositor.
    pub fn with_compositor(config: EditorConfig, compositor: GpuCompositor) -> Self {
        Self::with_gpu(config, Some(compositor))
    }

    fn with_gpu(config: EditorConfig, gpu: Option<GpuCompositor>) -> Self {
        let editor = Self {
            session: EditorSession::new(config),
            codec: ImageCodec::new(),
            gpu,
        };
        info!(
            target: "horizon_canvas::editor",
            backend = ?editor.backend(),
            "created editor"
        );
        editor
    }

    fn init_gpu(graphics: GraphicsConfig) -> Option<GpuCompositor> {
        match GraphicsContext::new(graphics).and_then(GpuCompositor::new) {
            Ok(compositor) => Some(compositor),
            Err(err) => {
                warn!(
                    target: "horizon_canvas::editor",
                    error = %err,
                    "GPU unavailable, compositing on the CPU"
                );
                None
            }
        }
    }

    /// The backend compositing currently runs on.
    pub fn backend(&self) -> Backend {
        match self.gpu {
            Some(_) => Backend::Gpu,
            None => Backend::Cpu,
        }
    }

    /// Whether the GPU path is still enabled.
    pub fn gpu_available(&self) -> bool {
        self.gpu.is_some()
    }

    /// The document.
    pub fn session(&self) -> &EditorSession {
        &self.session
    }

    /// The document, for editing.
    pub fn session_mut(&mut self) -> &mut EditorSession {
        &mut self.session
    }

    /// Run `render` on the GPU if enabled.
    ///
    /// Returns `None` to request the CPU path, either because there is no
    /// GPU or because the call failed. A failure other than an unsupported
    /// filter also disables the GPU for good.
    fn try_gpu<T>(
        &mut self,
        operation: &'static str,
        render: impl FnOnce(&GpuCompositor, &EditorSession) -> Result<T, RenderError>,
    ) -> Option<T> {
        let compositor = self.gpu.as_ref()?;
        match render(compositor, &self.session) {
            Ok(value) => Some(value),
            Err(RenderError::UnsupportedFilter(kind)) => {
                debug!(
                    target: "horizon_canvas::editor",
                    operation,
                    filter = %kind,
                    "filter not available on the GPU, using the CPU"
                );
                None
            }
            Err(err) => {
                warn!(
                    target: "horizon_canvas::editor",
                    operation,
                    error = %err,
                    "GPU call failed, disabling GPU compositing"
                );
                self.gpu = None;
                None
            }
        }
    }

    // ========================================================================
    // Compositing
    // ========================================================================

    /// Flatten all visible layers. `None` when there are no layers.
    pub fn composite_for_export(&mut self) -> Option<PixelBuffer> {
        let background = self.session.config().background;
        if let Some(result) = self.try_gpu("composite", |gpu, session| {
            gpu.composite(session.store().layers(), background)
        }) {
            return result;
        }
        self.session.composite_for_export()
    }

    /// Draw the active layer alone over white.
    ///
    /// The GPU handles the unzoomed, unpanned view; other views are drawn
    /// on the CPU.
    pub fn render_preview(&mut self, id: LayerId) -> Option<PixelBuffer> {
        if self.session.active_layer() != Some(id) || !self.session.view().is_identity() {
            return self.session.render_preview(id);
        }
        let (width, height) = self.session.canvas_size();
        let gpu_result = self.try_gpu("preview", |gpu, session| {
            let layers: Vec<GpuLayer<'_>> = session
                .layer(id)
                .filter(|layer| layer.is_visible())
                .map(GpuLayer::from_layer)
                .into_iter()
                .collect();
            gpu.composite_layers(&layers, width, height, Background::White)
        });
        gpu_result.or_else(|| self.session.render_preview(id))
    }

    /// Preview a pending filter value on the active layer without
    /// committing it.
    pub fn preview_filter(&mut self, id: LayerId, kind: FilterKind, value: f32) -> Option<PixelBuffer> {
        if self.session.active_layer() != Some(id) || !self.session.view().is_identity() {
            return self.session.preview_filter(id, kind, value);
        }
        let (width, height) = self.session.canvas_size();
        let gpu_result = self.try_gpu("filter preview", |gpu, session| {
            let layers: Vec<GpuLayer<'_>> = session
                .layer(id)
                .filter(|layer| layer.is_visible())
                .map(|layer| GpuLayer::previewing_filter(layer, kind, value))
                .into_iter()
                .collect();
            gpu.composite_layers(&layers, width, height, Background::White)
        });
        gpu_result.or_else(|| self.session.preview_filter(id, kind, value))
    }

    // ========================================================================
    // Import / export
    // ========================================================================

    /// Decode `bytes` and add them as a new active layer named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::Decode`](horizon_canvas_core::CanvasError::Decode)
    /// if the bytes are not a supported image; the document is unchanged.
    pub fn open_image(&mut self, bytes: &[u8], name: &str) -> CanvasResult<LayerId> {
        self.session.open_image(&self.codec, bytes, name)
    }

    /// Flatten, encode and persist the document as
    /// `edited-image-<unix millis>.<ext>`.
    ///
    /// Returns the location reported by `persistence`, or `None` when there
    /// are no layers.
    pub fn save_image<P>(&mut self, persistence: &mut P, format: ImageFormat) -> CanvasResult<Option<String>>
    where
        P: Persistence + ?Sized,
    {
        let Some(pixels) = self.composite_for_export() else {
            return Ok(None);
        };
        let quality = self.session.config().export_quality;
        horizon_canvas_core::io::save_pixels(&self.codec, persistence, &pixels, format, quality).map(Some)
    }

    /// Encode the active layer trimmed to its non-transparent pixels.
    pub fn export_active_layer(&self, format: ImageFormat) -> CanvasResult<Option<Vec<u8>>> {
        self.session.export_active_layer(&self.codec, format)
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("backend", &self.backend())
            .field("layers", &self.session.store().len())
            .finish_non_exhaustive()
    }
}
