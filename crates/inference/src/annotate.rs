//! Draw candidate boxes onto an image for the stored visualization.

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use schema::{RawDetection, label_for};

const CAPTION_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");
const CAPTION_PADDING: i32 = 2;
const CAPTION_TEXT: Rgb<u8> = Rgb([255, 255, 255]);

fn class_color(class_id: u32) -> Rgb<u8> {
    let (r, g, b) = match class_id {
        0 => (255, 56, 56),   // algal
        1 => (255, 157, 151), // blight
        2 => (255, 112, 31),  // Lcolletotrichum
        3 => (72, 249, 10),   // healthy
        4 => (207, 210, 49),  // phomopis
        5 => (26, 147, 52),   // rhizoctonia
        _ => (128, 128, 128),
    };
    Rgb([r, g, b])
}

/// Line width scaled with the image, at least 2 px.
fn line_width(width: u32, height: u32) -> u32 {
    (((width + height) as f32 / 2.0 * 0.003).round() as u32).max(2)
}

/// `"<label> <confidence>"` shown above each box.
fn caption(det: &RawDetection) -> String {
    format!("{} {:.2}", label_for(det.class_id), det.confidence)
}

/// Copy of `image` with every candidate drawn as a hollow rectangle in its
/// class colour, captioned with its label and confidence.
pub fn plot(image: &RgbImage, candidates: &[RawDetection]) -> RgbImage {
    let mut canvas = image.clone();
    let (w, h) = canvas.dimensions();
    if w == 0 || h == 0 {
        return canvas;
    }

    let thickness = line_width(w, h) as i32;
    let font = match FontRef::try_from_slice(CAPTION_FONT) {
        Ok(font) => Some(font),
        Err(e) => {
            tracing::warn!(error = %e, "Caption font failed to load, drawing boxes only");
            None
        }
    };
    let scale = PxScale::from((thickness * 6).max(12) as f32);

    for det in candidates {
        let (x1, y1, x2, y2) = det.bbox.to_pixel_xyxy(w, h);
        let x_min = (x1.min(x2).round() as i32).clamp(0, w as i32 - 1);
        let y_min = (y1.min(y2).round() as i32).clamp(0, h as i32 - 1);
        let x_max = (x1.max(x2).round() as i32).clamp(0, w as i32);
        let y_max = (y1.max(y2).round() as i32).clamp(0, h as i32);
        let rw = (x_max - x_min).max(1);
        let rh = (y_max - y_min).max(1);
        let color = class_color(det.class_id);

        for t in 0..thickness.min(rw / 2).min(rh / 2).max(1) {
            let inner = Rect::at(x_min + t, y_min + t)
                .of_size((rw - 2 * t).max(1) as u32, (rh - 2 * t).max(1) as u32);
            draw_hollow_rect_mut(&mut canvas, inner, color);
        }

        if let Some(font) = &font {
            draw_caption(&mut canvas, font, scale, (x_min, y_min), &caption(det), color);
        }
    }

    canvas
}

/// Filled label strip sitting on top of the box, or just inside it when the
/// box touches the top edge.
fn draw_caption(
    canvas: &mut RgbImage,
    font: &FontRef<'_>,
    scale: PxScale,
    (x, y): (i32, i32),
    text: &str,
    background: Rgb<u8>,
) {
    let (text_w, text_h) = text_size(scale, font, text);
    let strip_w = text_w as i32 + 2 * CAPTION_PADDING;
    let strip_h = text_h as i32 + 2 * CAPTION_PADDING;
    let top = if y >= strip_h { y - strip_h } else { y };

    draw_filled_rect_mut(
        canvas,
        Rect::at(x, top).of_size(strip_w as u32, strip_h as u32),
        background,
    );
    draw_text_mut(
        canvas,
        CAPTION_TEXT,
        x + CAPTION_PADDING,
        top + CAPTION_PADDING,
        scale,
        font,
        text,
    );
}
