//! Overlay rasterization onto captured frames

use std::io::Cursor;

use image::Rgba;
use thiserror::Error;

use crate::domain::overlay::Overlay;

/// Stroke color for detection boxes
const STROKE: Rgba<u8> = Rgba([0, 255, 0, 255]);
/// Stroke width in pixels
const STROKE_WIDTH: u32 = 3;

#[derive(Debug, Error)]
#[error("Failed to render overlay: {0}")]
pub struct RenderError(String);

/// Stroke the overlay's boxes onto the captured frame and re-encode as PNG.
///
/// Box coordinates are in the frame's native pixel space; anything outside
/// the frame is clipped rather than wrapped.
pub fn render_annotated(frame_png: &[u8], overlay: &Overlay) -> Result<Vec<u8>, RenderError> {
    let decoded = image::load_from_memory(frame_png).map_err(|e| RenderError(e.to_string()))?;
    let mut canvas = decoded.to_rgba8();
    let (width, height) = (canvas.width(), canvas.height());

    for bx in overlay.boxes() {
        let x1 = bx.x1.max(0.0).round() as u32;
        let y1 = bx.y1.max(0.0).round() as u32;
        let x2 = (bx.x2.round() as i64).clamp(0, width as i64) as u32;
        let y2 = (bx.y2.round() as i64).clamp(0, height as i64) as u32;
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        for t in 0..STROKE_WIDTH {
            // Top and bottom edges
            for x in x1..x2 {
                put(&mut canvas, x, y1.saturating_add(t), width, height);
                put(&mut canvas, x, (y2 - 1).saturating_sub(t), width, height);
            }
            // Left and right edges
            for y in y1..y2 {
                put(&mut canvas, x1.saturating_add(t), y, width, height);
                put(&mut canvas, (x2 - 1).saturating_sub(t), y, width, height);
            }
        }
    }

    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| RenderError(e.to_string()))?;
    Ok(png)
}

fn put(canvas: &mut image::RgbaImage, x: u32, y: u32, width: u32, height: u32) {
    if x < width && y < height {
        canvas.put_pixel(x, y, STROKE);
    }
}
