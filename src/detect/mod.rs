// Shrimp detection engine

pub mod annotate;
pub mod decode;
pub mod letterbox;
mod model;

use std::path::Path;

use image::RgbImage;
use ndarray::Array4;
use serde::{Deserialize, Serialize};

pub use decode::{BoundingBox, OutputLayout};
pub use letterbox::LetterboxTransform;

/// Per-frame detection output. Recomputed every frame, never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionResult {
    pub count: usize,
    pub boxes: Vec<BoundingBox>,
    pub inference_time_ms: f32,
}

/// Anything that can count shrimp in a frame. The session depends on this
/// seam rather than on the ONNX backend directly.
pub trait Detector {
    fn detect(&self, frame: &RgbImage) -> DetectionResult;
}

pub struct ShrimpDetector {
    backend: Option<model::OnnxBackend>,
    layout: Option<OutputLayout>,
    confidence_threshold: f32,
    input_size: u32,
}

impl ShrimpDetector {
    /// Load the detection model once. A load failure leaves the detector
    /// disabled: it then reports zero shrimp for every frame instead of
    /// taking the sampling loop down with it.
    pub fn load(model_path: &Path, confidence_threshold: f32, input_size: u32) -> Self {
        let backend = match model::OnnxBackend::load(model_path) {
            Ok(backend) => {
                log::info!("Loaded ONNX model: {}", model_path.display());
                Some(backend)
            }
            Err(e) => {
                log::warn!(
                    "Failed to load ONNX model {}: {}. Detection disabled.",
                    model_path.display(),
                    e
                );
                None
            }
        };

        // Resolve the output layout once from the declared shape; models
        // exporting dynamic dims fall back to the runtime shape per frame.
        let layout = backend.as_ref().and_then(|b| {
            let resolved = b
                .declared_trailing_dim()
                .and_then(OutputLayout::from_trailing_dim);
            if resolved.is_none() {
                log::info!("Model output shape is dynamic; resolving layout per frame");
            }
            resolved
        });

        Self {
            backend,
            layout,
            confidence_threshold,
            input_size,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }
}

impl Detector for ShrimpDetector {
    fn detect(&self, frame: &RgbImage) -> DetectionResult {
        let Some(backend) = &self.backend else {
            return DetectionResult::default();
        };

        let (padded, transform) = letterbox::letterbox(frame, self.input_size);
        let input = image_to_tensor(&padded);

        let raw = match backend.run(input) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Inference failed, skipping frame: {}", e);
                return DetectionResult::default();
            }
        };

        let layout = self
            .layout
            .or_else(|| OutputLayout::from_trailing_dim(raw.rows.ncols()));
        let Some(layout) = layout else {
            log::warn!(
                "Unsupported output row width {}, skipping frame",
                raw.rows.ncols()
            );
            return DetectionResult::default();
        };

        let boxes = decode::decode(
            layout,
            raw.rows.view(),
            self.confidence_threshold,
            &transform,
        );

        DetectionResult {
            count: boxes.len(),
            boxes,
            inference_time_ms: raw.inference_time_ms,
        }
    }
}

/// Convert a letterboxed RGB image to a normalized NCHW float tensor.
fn image_to_tensor(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel.0[c] as f32 / 255.0;
        }
    }

    tensor
}
