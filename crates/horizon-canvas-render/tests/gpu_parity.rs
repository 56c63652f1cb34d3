//! GPU compositing tests.
//!
//! Tests that need a GPU are ignored by default. Run them with:
//! ```text
//! cargo test --package horizon-canvas-render -- --ignored
//! ```

use horizon_canvas_core::composite::{Background, blend_onto};
use horizon_canvas_core::filter::render_filter;
use horizon_canvas_core::image::Rgba;
use horizon_canvas_core::{BlendMode, EditorConfig, EditorSession, FilterKind, PixelBuffer};
use horizon_canvas_render::{
    BufferDimensions, GpuCompositor, GpuLayer, GraphicsConfig, GraphicsContext, RenderError,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn compositor() -> GpuCompositor {
    init_tracing();
    let ctx = GraphicsContext::new(GraphicsConfig::default()).expect("Failed to init graphics");
    GpuCompositor::new(ctx).expect("Failed to create compositor")
}

fn gradient(width: u32, height: u32, alpha: u8) -> PixelBuffer {
    let mut buffer = PixelBuffer::new(width, height);
    for (x, y, px) in buffer.image_mut().enumerate_pixels_mut() {
        *px = Rgba([
            (x * 255 / width.max(2).saturating_sub(1)) as u8,
            (y * 255 / height.max(2).saturating_sub(1)) as u8,
            ((x * 7 + y * 13) % 256) as u8,
            alpha,
        ]);
    }
    buffer
}

fn assert_close(gpu: &PixelBuffer, cpu: &PixelBuffer, what: &str) {
    assert_eq!(gpu.dimensions(), cpu.dimensions(), "{what}: size");
    for (i, (g, c)) in gpu.as_raw().iter().zip(cpu.as_raw()).enumerate() {
        assert!(
            (*g as i32 - *c as i32).abs() <= 1,
            "{what}: byte {i} differs, gpu {g} cpu {c}"
        );
    }
}

// ============================================================================
// Without a GPU
// ============================================================================

#[test]
fn test_buffer_dimensions_alignment() {
    let dims = BufferDimensions::new(100, 100);
    assert_eq!(dims.unpadded_bytes_per_row, 400);
    assert_eq!(dims.padded_bytes_per_row % 256, 0);
    assert!(dims.padded_bytes_per_row >= dims.unpadded_bytes_per_row);
}

#[test]
fn test_render_error_messages() {
    let err = RenderError::UnsupportedFilter(FilterKind::Blur);
    assert_eq!(err.to_string(), "filter not supported on the GPU: blur");

    let err = RenderError::InvalidDimensions { width: 0, height: 5 };
    assert_eq!(err.to_string(), "invalid texture dimensions: 0x5");
}

#[test]
fn test_preview_samples_baseline() {
    let mut session = EditorSession::new(EditorConfig::new().with_canvas_size(4, 4));
    let id = session.add_layer();
    session.apply_filter(id, FilterKind::Brightness, -40.0);
    let layer = session.layer(id).unwrap();

    let preview = GpuLayer::previewing_filter(layer, FilterKind::Contrast, 20.0);
    assert_eq!(Some(preview.pixels), layer.baseline());
    assert_eq!(preview.filter, Some((FilterKind::Contrast, 20.0)));
    assert_eq!(preview.blend_mode, layer.blend_mode());
}

#[test]
fn test_from_layer_uses_current_pixels() {
    let mut session = EditorSession::new(EditorConfig::new().with_canvas_size(4, 4));
    let id = session.add_layer();
    session.apply_filter(id, FilterKind::Grayscale, 100.0);
    let layer = session.layer(id).unwrap();

    let gpu_layer = GpuLayer::from_layer(layer);
    assert_eq!(gpu_layer.pixels, layer.current());
    assert!(gpu_layer.filter.is_none());
    assert_eq!(gpu_layer.opacity, 1.0);
}

// ============================================================================
// GPU parity
// ============================================================================

#[test]
#[ignore = "requires GPU"]
fn test_blend_modes_match_cpu() {
    let compositor = compositor();
    let backdrop = gradient(67, 33, 255);
    let source = gradient(67, 33, 180);

    for mode in BlendMode::ALL {
        let gpu = compositor
            .composite_layers(
                &[
                    GpuLayer::new(&backdrop),
                    GpuLayer::new(&source).with_blend_mode(mode).with_opacity(0.6),
                ],
                67,
                33,
                Background::Transparent,
            )
            .unwrap();

        let mut cpu = Background::Transparent.canvas(67, 33);
        blend_onto(cpu.image_mut(), backdrop.as_image(), BlendMode::Normal, 1.0);
        blend_onto(cpu.image_mut(), source.as_image(), mode, 0.6);

        assert_close(&gpu, &cpu, mode.name());
    }
}

#[test]
#[ignore = "requires GPU"]
fn test_point_filters_match_cpu() {
    let compositor = compositor();
    let source = gradient(40, 24, 200);

    for (kind, value) in [
        (FilterKind::Brightness, 35.0),
        (FilterKind::Contrast, -60.0),
        (FilterKind::Saturation, 70.0),
        (FilterKind::Hue, -150.0),
        (FilterKind::Grayscale, 45.0),
    ] {
        let gpu = compositor.apply_filter(&source, kind, value).unwrap();
        let cpu = render_filter(&source, kind, value);
        assert_close(&gpu, &cpu, kind.name());
    }
}

#[test]
#[ignore = "requires GPU"]
fn test_filtered_pass_matches_filter_then_blend() {
    let compositor = compositor();
    let backdrop = gradient(20, 20, 255);
    let source = gradient(20, 20, 255);

    let gpu = compositor
        .composite_layers(
            &[
                GpuLayer::new(&backdrop),
                GpuLayer::new(&source)
                    .with_blend_mode(BlendMode::Screen)
                    .with_opacity(0.5)
                    .with_filter(FilterKind::Hue, 90.0),
            ],
            20,
            20,
            Background::White,
        )
        .unwrap();

    let filtered = render_filter(&source, FilterKind::Hue, 90.0);
    let mut cpu = Background::White.canvas(20, 20);
    blend_onto(cpu.image_mut(), backdrop.as_image(), BlendMode::Normal, 1.0);
    blend_onto(cpu.image_mut(), filtered.as_image(), BlendMode::Screen, 0.5);

    assert_close(&gpu, &cpu, "filtered screen");
}

#[test]
#[ignore = "requires GPU"]
fn test_session_composite_matches_cpu() {
    let compositor = compositor();
    let mut session = EditorSession::new(EditorConfig::new().with_canvas_size(48, 30));
    let bottom = session.add_layer();
    let top = session.create_layer("small", 20, 10);
    session.replace_buffer(bottom, gradient(48, 30, 255));
    session.replace_buffer(top, PixelBuffer::filled(20, 10, Rgba([0, 0, 255, 255])));
    session.update_props(
        top,
        horizon_canvas_core::LayerUpdate::new()
            .with_opacity(0.5)
            .with_blend_mode(BlendMode::Multiply),
    );

    let gpu = compositor
        .composite(session.store().layers(), Background::Transparent)
        .unwrap()
        .unwrap();
    let cpu = session.composite_for_export().unwrap();
    assert_close(&gpu, &cpu, "session");

    // outside the small layer the bottom layer shows through untouched
    assert_eq!(gpu.pixel(40, 25), cpu.pixel(40, 25));
}

#[test]
#[ignore = "requires GPU"]
fn test_transparent_pixels_keep_color_under_filter() {
    let compositor = compositor();
    let source = PixelBuffer::filled(4, 4, Rgba([200, 100, 50, 0]));

    let out = compositor.apply_filter(&source, FilterKind::Brightness, 10.0).unwrap();
    let [r, g, b, a] = out.pixel(1, 1).unwrap();
    assert_eq!(a, 0);
    assert!((r as i32 - 226).abs() <= 1);
    assert!((g as i32 - 126).abs() <= 1);
    assert!((b as i32 - 76).abs() <= 1);
}

#[test]
#[ignore = "requires GPU"]
fn test_blur_is_unsupported() {
    let compositor = compositor();
    let source = PixelBuffer::white(8, 8);

    let err = compositor.apply_filter(&source, FilterKind::Blur, 4.0).unwrap_err();
    assert!(matches!(err, RenderError::UnsupportedFilter(FilterKind::Blur)));

    let err = compositor
        .composite_layers(
            &[GpuLayer::new(&source).with_filter(FilterKind::Blur, 2.0)],
            8,
            8,
            Background::Transparent,
        )
        .unwrap_err();
    assert!(matches!(err, RenderError::UnsupportedFilter(FilterKind::Blur)));
}

#[test]
#[ignore = "requires GPU"]
fn test_empty_document() {
    let compositor = compositor();
    assert!(compositor.composite(&[], Background::White).unwrap().is_none());
}
