//! End-to-end editor tests on the CPU backend: real codecs and files.

use horizon_canvas::image::Rgba;
use horizon_canvas::{
    Backend, BlendMode, CanvasError, Codec, DirectoryPersistence, Editor, EditorConfig, FilterKind,
    ImageCodec, ImageFormat, LayerUpdate, MemoryPersistence, PixelBuffer,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn editor(width: u32, height: u32) -> Editor {
    init_tracing();
    Editor::cpu_only(EditorConfig::new().with_canvas_size(width, height))
}

fn png_of(pixels: &PixelBuffer) -> Vec<u8> {
    ImageCodec.encode(pixels, ImageFormat::Png, 90).unwrap()
}

#[test]
fn test_open_wide_image_is_letterboxed() {
    let mut editor = editor(40, 40);
    let photo = PixelBuffer::filled(20, 10, Rgba([0, 0, 0, 255]));

    let id = editor.open_image(&png_of(&photo), "wide.png").unwrap();
    let layer = editor.session().layer(id).unwrap();

    assert_eq!(layer.name(), "wide.png");
    assert_eq!(layer.size(), (40, 40));
    // scaled 2x to 40x20 and centered vertically on white
    assert_eq!(layer.current().pixel(20, 20), Some([0, 0, 0, 255]));
    assert_eq!(layer.current().pixel(20, 2), Some([255, 255, 255, 255]));
    assert_eq!(layer.current().pixel(20, 37), Some([255, 255, 255, 255]));
    assert_eq!(editor.session().history().len(), 1);
}

#[test]
fn test_open_garbage_leaves_document_alone() {
    let mut editor = editor(8, 8);
    editor.session_mut().add_layer();

    let err = editor.open_image(b"\x89PNG but not really", "bad.png").unwrap_err();
    assert!(matches!(err, CanvasError::Decode { .. }));
    assert_eq!(editor.session().store().len(), 1);
    assert!(editor.session().history().is_empty());
}

#[test]
fn test_save_to_directory_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let mut exports = DirectoryPersistence::new(dir.path());
    let mut editor = editor(12, 6);

    let bottom = editor.session_mut().add_layer();
    let top = editor.session_mut().add_layer();
    editor
        .session_mut()
        .replace_buffer(bottom, PixelBuffer::filled(12, 6, Rgba([255, 0, 0, 255])));
    editor
        .session_mut()
        .replace_buffer(top, PixelBuffer::filled(12, 6, Rgba([0, 0, 255, 255])));
    editor.session_mut().update_props(
        top,
        LayerUpdate::new().with_opacity(0.5).with_blend_mode(BlendMode::Multiply),
    );

    let path = editor.save_image(&mut exports, ImageFormat::Png).unwrap().unwrap();
    let file_name = std::path::Path::new(&path).file_name().unwrap().to_str().unwrap();
    assert!(file_name.starts_with("edited-image-"));
    assert!(file_name.ends_with(".png"));

    let decoded = ImageCodec.decode(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(decoded.pixels, editor.composite_for_export().unwrap());
}

#[test]
fn test_save_empty_document_writes_nothing() {
    let mut editor = editor(4, 4);
    let mut sink = MemoryPersistence::new();
    assert_eq!(editor.save_image(&mut sink, ImageFormat::Png).unwrap(), None);
    assert!(sink.is_empty());
}

#[test]
fn test_save_transparent_document_as_jpeg_is_white() {
    let mut editor = editor(32, 32);
    let id = editor.session_mut().add_layer();
    editor.session_mut().replace_buffer(id, PixelBuffer::new(32, 32));

    let mut sink = MemoryPersistence::new();
    let location = editor.save_image(&mut sink, ImageFormat::Jpeg).unwrap().unwrap();
    let filename = location.trim_start_matches("memory://");
    assert!(filename.ends_with(".jpg"));

    let decoded = ImageCodec.decode(sink.get(filename).unwrap()).unwrap();
    let [r, g, b, a] = decoded.pixels.pixel(16, 16).unwrap();
    assert_eq!(a, 255);
    assert!(r >= 250 && g >= 250 && b >= 250, "got {:?}", [r, g, b]);
}

#[test]
fn test_export_active_layer_as_jpeg() {
    let mut editor = editor(20, 20);
    let id = editor.session_mut().add_layer();
    let mut pixels = PixelBuffer::new(20, 20);
    for y in 5..9 {
        for x in 2..12 {
            pixels.image_mut().put_pixel(x, y, Rgba([0, 128, 0, 255]));
        }
    }
    editor.session_mut().replace_buffer(id, pixels);

    let bytes = editor.export_active_layer(ImageFormat::Jpeg).unwrap().unwrap();
    let decoded = ImageCodec.decode(&bytes).unwrap();
    assert_eq!(decoded.format, Some(ImageFormat::Jpeg));
    assert_eq!(decoded.pixels.dimensions(), (10, 4));

    let png = editor.export_active_layer(ImageFormat::Png).unwrap().unwrap();
    let decoded = ImageCodec.decode(&png).unwrap();
    assert_eq!(decoded.pixels, PixelBuffer::filled(10, 4, Rgba([0, 128, 0, 255])));
}

#[test]
fn test_filter_preview_then_commit() {
    let mut editor = editor(10, 10);
    let id = editor.session_mut().add_layer();
    editor
        .session_mut()
        .replace_buffer(id, PixelBuffer::filled(10, 10, Rgba([200, 60, 60, 255])));

    let preview = editor.preview_filter(id, FilterKind::Grayscale, 100.0).unwrap();
    let committed = editor.session_mut().apply_filter(id, FilterKind::Grayscale, 100.0).unwrap();

    // an opaque layer over white previews exactly as it will look
    assert_eq!(preview, committed);
    assert_eq!(editor.render_preview(id).unwrap(), committed);
    assert_eq!(editor.backend(), Backend::Cpu);
}
