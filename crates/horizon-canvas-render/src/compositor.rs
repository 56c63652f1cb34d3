//! GPU layer compositing.
//!
//! [`GpuCompositor`] flattens layers with the same straight-alpha blend
//! equations as [`horizon_canvas_core::composite`]. Blend modes other than
//! normal cannot be expressed with fixed-function blend state, so every
//! layer is drawn with a fragment shader that reads the accumulated backdrop
//! as a texture and writes into a second accumulator. The two accumulators
//! swap roles after each layer.
//!
//! Two pipeline variants share the shader module:
//!
//! - [`PipelineVariant::Blend`] composites the layer as stored.
//! - [`PipelineVariant::BlendFiltered`] first runs a point filter on the
//!   layer sample, so a pending adjustment can be previewed without
//!   touching the layer's pixels.
//!
//! Results match the CPU path to within one 8-bit unit per channel.
//!
//! # Example
//!
//! ```no_run
//! use horizon_canvas_core::composite::Background;
//! use horizon_canvas_core::EditorSession;
//! use horizon_canvas_render::{GpuCompositor, GraphicsConfig, GraphicsContext};
//!
//! let mut session = EditorSession::default();
//! session.add_layer();
//!
//! let ctx = GraphicsContext::new(GraphicsConfig::default()).unwrap();
//! let compositor = GpuCompositor::new(ctx).unwrap();
//! let flat = compositor
//!     .composite(session.store().layers(), Background::White)
//!     .unwrap();
//! assert!(flat.is_some());
//! ```

use horizon_canvas_core::composite::Background;
use horizon_canvas_core::{BlendMode, FilterKind, Layer, PixelBuffer};
use tracing::{debug, trace};
use wgpu::util::DeviceExt;

use crate::capture::{read_texture, upload_texture};
use crate::context::GraphicsContext;
use crate::error::{RenderError, RenderResult};

/// Accumulator format. Linear so stored bytes are the blended values.
const ACCUMULATOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Which fragment entry point a layer is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineVariant {
    /// Blend the layer sample onto the backdrop.
    Blend,
    /// Run the filter stage on the layer sample, then blend.
    BlendFiltered,
}

impl PipelineVariant {
    fn entry_point(self) -> &'static str {
        match self {
            PipelineVariant::Blend => "fs_blend",
            PipelineVariant::BlendFiltered => "fs_blend_filtered",
        }
    }
}

/// Uniform block for one compositing pass.
///
/// Layout matches `CompositeUniforms` in `composite.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct CompositeUniforms {
    blend_mode: u32,
    filter_kind: u32,
    opacity: f32,
    filter_value: f32,
    layer_size: [u32; 2],
    replace: u32,
    _padding: u32,
}

/// No filter selected; the filtered entry point passes the sample through.
const NO_FILTER: u32 = u32::MAX;

/// One layer as the compositor sees it.
///
/// Visibility is the caller's concern: every `GpuLayer` handed to
/// [`GpuCompositor::composite_layers`] is drawn.
#[derive(Debug, Clone, Copy)]
pub struct GpuLayer<'a> {
    /// Layer pixels, drawn at the canvas origin.
    pub pixels: &'a PixelBuffer,
    /// Blend mode against the layers below.
    pub blend_mode: BlendMode,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    /// Point filter to run on the sample before blending.
    pub filter: Option<(FilterKind, f32)>,
}

impl<'a> GpuLayer<'a> {
    /// Opaque, normal-blended pixels with no filter.
    pub fn new(pixels: &'a PixelBuffer) -> Self {
        Self {
            pixels,
            blend_mode: BlendMode::Normal,
            opacity: 1.0,
            filter: None,
        }
    }

    /// The current pixels and compositing properties of `layer`.
    pub fn from_layer(layer: &'a Layer) -> Self {
        Self {
            pixels: layer.current(),
            blend_mode: layer.blend_mode(),
            opacity: layer.opacity(),
            filter: None,
        }
    }

    /// Preview `kind` at `value` on top of the layer's pre-filter pixels.
    ///
    /// Filters recompute from the baseline, so the preview samples the
    /// baseline when the layer has one.
    pub fn previewing_filter(layer: &'a Layer, kind: FilterKind, value: f32) -> Self {
        Self {
            pixels: layer.baseline().unwrap_or_else(|| layer.current()),
            filter: Some((kind, value)),
            ..Self::from_layer(layer)
        }
    }

    /// Set the blend mode.
    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    /// Set the opacity.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// Run a point filter on the sample before blending.
    pub fn with_filter(mut self, kind: FilterKind, value: f32) -> Self {
        self.filter = Some((kind, value));
        self
    }

    fn variant(&self) -> PipelineVariant {
        match self.filter {
            Some(_) => PipelineVariant::BlendFiltered,
            None => PipelineVariant::Blend,
        }
    }

    fn uniforms(&self, replace: bool) -> CompositeUniforms {
        let (filter_kind, filter_value) = match self.filter {
            Some((kind, value)) => (kind.shader_id(), kind.clamp(value)),
            None => (NO_FILTER, 0.0),
        };
        CompositeUniforms {
            blend_mode: self.blend_mode.shader_id(),
            filter_kind,
            opacity: self.opacity.clamp(0.0, 1.0),
            filter_value,
            layer_size: [self.pixels.width(), self.pixels.height()],
            replace: replace as u32,
            _padding: 0,
        }
    }
}

/// Flattens layers on the GPU.
pub struct GpuCompositor {
    ctx: GraphicsContext,
    bind_group_layout: wgpu::BindGroupLayout,
    blend_pipeline: wgpu::RenderPipeline,
    filtered_pipeline: wgpu::RenderPipeline,
}

impl GpuCompositor {
    /// Compile the compositing shader and build both pipeline variants.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Validation`] if the device rejects the shader
    /// or a pipeline.
    pub fn new(ctx: GraphicsContext) -> RenderResult<Self> {
        let device = ctx.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("compositor_bind_group_layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("composite_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/composite.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("compositor_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let blend_pipeline = create_composite_pipeline(device, &shader, &pipeline_layout, PipelineVariant::Blend);
        let filtered_pipeline =
            create_composite_pipeline(device, &shader, &pipeline_layout, PipelineVariant::BlendFiltered);

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::Validation(err.to_string()));
        }

        debug!(
            target: "horizon_canvas_render::compositor",
            adapter = %ctx.adapter_info().name,
            "created GPU compositor"
        );

        Ok(Self {
            ctx,
            bind_group_layout,
            blend_pipeline,
            filtered_pipeline,
        })
    }

    /// The graphics context this compositor renders with.
    pub fn context(&self) -> &GraphicsContext {
        &self.ctx
    }

    fn pipeline(&self, variant: PipelineVariant) -> &wgpu::RenderPipeline {
        match variant {
            PipelineVariant::Blend => &self.blend_pipeline,
            PipelineVariant::BlendFiltered => &self.filtered_pipeline,
        }
    }

    /// Flatten the visible layers of a document, bottom to top.
    ///
    /// The canvas is as large as the largest layer buffer, visible or not.
    /// Returns `Ok(None)` when there are no layers.
    pub fn composite(&self, layers: &[Layer], background: Background) -> RenderResult<Option<PixelBuffer>> {
        let Some((width, height)) = layers
            .iter()
            .map(|layer| layer.current().dimensions())
            .reduce(|(w, h), (lw, lh)| (w.max(lw), h.max(lh)))
        else {
            return Ok(None);
        };

        let visible: Vec<GpuLayer<'_>> = layers
            .iter()
            .filter(|layer| layer.is_visible())
            .map(GpuLayer::from_layer)
            .collect();

        self.composite_layers(&visible, width, height, background).map(Some)
    }

    /// Draw `layers` bottom to top onto a `width` x `height` canvas.
    ///
    /// Layers smaller than the canvas leave the uncovered region untouched;
    /// larger ones are clipped.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnsupportedFilter`] if a layer asks for a
    /// filter that is not a point operation (blur), and
    /// [`RenderError::InvalidDimensions`] if a texture would exceed the
    /// device limits.
    pub fn composite_layers(
        &self,
        layers: &[GpuLayer<'_>],
        width: u32,
        height: u32,
        background: Background,
    ) -> RenderResult<PixelBuffer> {
        for layer in layers {
            if let Some((kind, _)) = layer.filter {
                if !kind.is_point_op() {
                    return Err(RenderError::UnsupportedFilter(kind));
                }
            }
        }

        let passes: Vec<_> = layers
            .iter()
            .map(|layer| (layer.pixels, layer.uniforms(false), layer.variant()))
            .collect();
        let result = self.run_passes(&passes, width, height, background)?;

        debug!(
            target: "horizon_canvas_render::compositor",
            layers = layers.len(),
            width,
            height,
            "composited on GPU"
        );
        Ok(result)
    }

    /// Run a point filter over `source` and return the filtered pixels.
    ///
    /// Alpha and the color of fully transparent pixels are preserved, as on
    /// the CPU. A neutral value returns a copy of `source`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnsupportedFilter`] for blur.
    pub fn apply_filter(&self, source: &PixelBuffer, kind: FilterKind, value: f32) -> RenderResult<PixelBuffer> {
        if !kind.is_point_op() {
            return Err(RenderError::UnsupportedFilter(kind));
        }
        let value = kind.clamp(value);
        if value == kind.neutral() {
            return Ok(source.clone());
        }

        let layer = GpuLayer::new(source).with_filter(kind, value);
        let (width, height) = source.dimensions();
        let passes = [(source, layer.uniforms(true), PipelineVariant::BlendFiltered)];
        let result = self.run_passes(&passes, width, height, Background::Transparent)?;

        debug!(
            target: "horizon_canvas_render::compositor",
            filter = %kind,
            value,
            width,
            height,
            "filtered on GPU"
        );
        Ok(result)
    }

    fn run_passes(
        &self,
        passes: &[(&PixelBuffer, CompositeUniforms, PipelineVariant)],
        width: u32,
        height: u32,
        background: Background,
    ) -> RenderResult<PixelBuffer> {
        self.ctx.check_dimensions(width, height)?;
        for (pixels, _, _) in passes {
            self.ctx.check_dimensions(pixels.width(), pixels.height())?;
        }
        let device = self.ctx.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let accumulators = [
            create_accumulator(device, width, height, "compositor_accumulator_a"),
            create_accumulator(device, width, height, "compositor_accumulator_b"),
        ];
        let views = accumulators
            .each_ref()
            .map(|texture| texture.create_view(&wgpu::TextureViewDescriptor::default()));

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("compositor_encoder"),
        });

        // Clear the first accumulator to the background.
        let [r, g, b, a] = background.rgba().0;
        let clear = wgpu::Color {
            r: r as f64 / 255.0,
            g: g as f64 / 255.0,
            b: b as f64 / 255.0,
            a: a as f64 / 255.0,
        };
        begin_pass(&mut encoder, &views[0], clear, "compositor_clear_pass");

        for (index, (pixels, uniforms, variant)) in passes.iter().enumerate() {
            let backdrop = &views[index % 2];
            let target = &views[(index + 1) % 2];

            let layer_texture = upload_texture(&self.ctx, pixels, "compositor_layer_texture")?;
            let layer_view = layer_texture.create_view(&wgpu::TextureViewDescriptor::default());

            let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("compositor_uniform_buffer"),
                contents: bytemuck::bytes_of(uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("compositor_bind_group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(backdrop),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&layer_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                ],
            });

            let mut pass = begin_pass(&mut encoder, target, wgpu::Color::TRANSPARENT, "compositor_layer_pass");
            pass.set_pipeline(self.pipeline(*variant));
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);

            trace!(
                target: "horizon_canvas_render::compositor",
                index,
                blend_mode = uniforms.blend_mode,
                opacity = uniforms.opacity,
                ?variant,
                "encoded layer pass"
            );
        }

        self.ctx.queue().submit(std::iter::once(encoder.finish()));

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::Validation(err.to_string()));
        }

        read_texture(&self.ctx, &accumulators[passes.len() % 2])
    }
}

impl std::fmt::Debug for GpuCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuCompositor").field("ctx", &self.ctx).finish_non_exhaustive()
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn create_accumulator(device: &wgpu::Device, width: u32, height: u32, label: &str) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: ACCUMULATOR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    clear: wgpu::Color,
    label: &str,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(clear),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

fn create_composite_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    variant: PipelineVariant,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(match variant {
            PipelineVariant::Blend => "composite_blend_pipeline",
            PipelineVariant::BlendFiltered => "composite_blend_filtered_pipeline",
        }),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(variant.entry_point()),
            targets: &[Some(wgpu::ColorTargetState {
                format: ACCUMULATOR_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
