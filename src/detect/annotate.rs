// Frame annotation: detection boxes plus an FPS/count HUD.
//
// Boxes are drawn on a copy and blended back over the original at 60 %
// opacity. The HUD line needs a font; when none is configured the overlay is
// boxes-only.

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::constants::{HUD_ORIGIN_X, HUD_ORIGIN_Y, HUD_TEXT_PX, OVERLAY_ALPHA};

use super::DetectionResult;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Load an annotation font from a TTF/OTF file. Absence is not an error;
/// the HUD is simply omitted.
pub fn load_font(path: &std::path::Path) -> Option<FontArc> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            log::warn!("Could not read font {}: {}", path.display(), e);
            return None;
        }
    };
    match FontArc::try_from_vec(data) {
        Ok(font) => Some(font),
        Err(e) => {
            log::warn!("Could not parse font {}: {}", path.display(), e);
            None
        }
    }
}

/// Draw the detection result over a frame and return the annotated copy.
pub fn annotate(frame: &RgbImage, result: &DetectionResult, font: Option<&FontArc>) -> RgbImage {
    let mut overlay = frame.clone();

    for b in &result.boxes {
        let width = ((b.x2 - b.x1).max(1.0)) as u32;
        let height = ((b.y2 - b.y1).max(1.0)) as u32;
        let rect = Rect::at(b.x1 as i32, b.y1 as i32).of_size(width, height);
        draw_hollow_rect_mut(&mut overlay, rect, BOX_COLOR);
    }

    let mut blended = frame.clone();
    for (dst, src) in blended.pixels_mut().zip(overlay.pixels()) {
        for c in 0..3 {
            let mixed = OVERLAY_ALPHA * src.0[c] as f32 + (1.0 - OVERLAY_ALPHA) * dst.0[c] as f32;
            dst.0[c] = mixed.round().clamp(0.0, 255.0) as u8;
        }
    }

    if let Some(font) = font {
        let fps = if result.inference_time_ms > 0.0 {
            (1000.0 / result.inference_time_ms) as u32
        } else {
            0
        };
        let label = format!("{} FPS | Count: {}", fps, result.count);
        draw_text_mut(
            &mut blended,
            BOX_COLOR,
            HUD_ORIGIN_X,
            HUD_ORIGIN_Y,
            PxScale::from(HUD_TEXT_PX),
            font,
            &label,
        );
    }

    blended
}
