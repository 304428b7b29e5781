// Aspect-preserving letterbox geometry.
//
// The detector sees a fixed square input; frames are scaled to fit and the
// remainder padded with neutral gray. The transform is kept so detections can
// be mapped back to original-frame pixels.

use image::{imageops, Rgb, RgbImage};

use crate::constants::LETTERBOX_FILL;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    pub scale: f32,
    pub pad_left: f32,
    pub pad_top: f32,
    pub frame_width: f32,
    pub frame_height: f32,
}

impl LetterboxTransform {
    /// Map a point from letterboxed coordinates back to the original frame.
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let x = ((x - self.pad_left) / self.scale).clamp(0.0, self.frame_width);
        let y = ((y - self.pad_top) / self.scale).clamp(0.0, self.frame_height);
        (x, y)
    }

    /// Map a point from original-frame coordinates into the letterboxed square.
    pub fn to_letterboxed(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.pad_left, y * self.scale + self.pad_top)
    }
}

/// Resize a frame to fit a square of `input_size` while preserving aspect
/// ratio, padding symmetrically with gray. Returns the padded image and the
/// transform for inverse mapping.
pub fn letterbox(frame: &RgbImage, input_size: u32) -> (RgbImage, LetterboxTransform) {
    let (width, height) = frame.dimensions();
    let scale = (input_size as f32 / width as f32).min(input_size as f32 / height as f32);

    let new_width = ((width as f32 * scale) as u32).clamp(1, input_size);
    let new_height = ((height as f32 * scale) as u32).clamp(1, input_size);

    let resized = imageops::resize(frame, new_width, new_height, imageops::FilterType::Triangle);

    let pad_left = (input_size - new_width) / 2;
    let pad_top = (input_size - new_height) / 2;

    let mut padded = RgbImage::from_pixel(
        input_size,
        input_size,
        Rgb([LETTERBOX_FILL, LETTERBOX_FILL, LETTERBOX_FILL]),
    );
    imageops::replace(&mut padded, &resized, pad_left as i64, pad_top as i64);

    let transform = LetterboxTransform {
        scale,
        pad_left: pad_left as f32,
        pad_top: pad_top as f32,
        frame_width: width as f32,
        frame_height: height as f32,
    };

    (padded, transform)
}
