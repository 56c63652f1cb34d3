//! Headless editing session.
//!
//! Builds a small document, applies filters and blend modes, prints the
//! undo state, and writes the flattened result to `target/edit_session/`.
//!
//! Run with: cargo run -p horizon-canvas --example edit_session

use horizon_canvas::color::parse_hex;
use horizon_canvas::glam::Vec2;
use horizon_canvas::image::Rgba;
use horizon_canvas::{
    BlendMode, DirectoryPersistence, Editor, EditorConfig, FilterKind, ImageFormat, LayerUpdate, PixelBuffer,
    ToolAction,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("Edit session example");
    println!("====================");
    println!();

    let mut editor = Editor::new(EditorConfig::default().with_canvas_size(640, 400));
    println!("Compositing backend: {:?}", editor.backend());

    let session = editor.session_mut();
    let (width, height) = session.canvas_size();

    // A horizontal gradient as the background layer
    let background = session.add_layer();
    let mut gradient = PixelBuffer::new(width, height);
    for (x, y, px) in gradient.image_mut().enumerate_pixels_mut() {
        *px = Rgba([(x * 255 / width) as u8, (y * 255 / height) as u8, 160, 255]);
    }
    session.replace_buffer(background, gradient);
    session.apply_filter(background, FilterKind::Saturation, 40.0);

    // A brush stroke on a multiply layer
    let strokes = session.add_layer();
    session.replace_buffer(strokes, PixelBuffer::new(width, height));
    session.apply_tool(&ToolAction::Brush {
        points: vec![Vec2::new(60.0, 60.0), Vec2::new(320.0, 200.0), Vec2::new(580.0, 90.0)],
        size: 30.0,
        color: parse_hex("#1e5ac8").ok_or("bad brush color")?,
    });
    session.update_props(
        strokes,
        LayerUpdate::new()
            .with_name("Strokes")
            .with_blend_mode(BlendMode::Multiply)
            .with_opacity(0.8),
    );

    println!(
        "Layers: {}, history: {} (undo: {}, redo: {})",
        session.store().len(),
        session.history().len(),
        session.can_undo(),
        session.can_redo()
    );

    session.undo();
    println!("After undo, strokes layer opacity: {}", session.layer(strokes).map_or(0.0, |l| l.opacity()));
    session.redo();

    let mut exports = DirectoryPersistence::new("target/edit_session");
    match editor.save_image(&mut exports, ImageFormat::Png)? {
        Some(path) => println!("Saved {path}"),
        None => println!("Nothing to save"),
    }

    Ok(())
}
