// ONNX inference backend.
//
// One session is built at load time and reused for every frame. The backend
// never appears on the hot path unwrapped: ShrimpDetector holds it as an
// Option and treats a missing backend as "always zero detections".

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use ndarray::{Array2, Array4, CowArray};
use ort::{Environment, GraphOptimizationLevel, Session, SessionBuilder, Value};

use crate::error::{Result, ShrimpScaleError};

pub struct OnnxBackend {
    session: Session,
}

/// One inference pass: batch-0 rows plus the measured wall time.
pub struct RawOutput {
    pub rows: Array2<f32>,
    pub inference_time_ms: f32,
}

impl OnnxBackend {
    pub fn load(model_path: &Path) -> Result<Self> {
        let environment = Arc::new(
            Environment::builder()
                .with_name("shrimpscale")
                .build()
                .map_err(|e| ShrimpScaleError::Model(e.to_string()))?,
        );

        let session = SessionBuilder::new(&environment)
            .map_err(|e| ShrimpScaleError::Model(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ShrimpScaleError::Model(e.to_string()))?
            .with_model_from_file(model_path)
            .map_err(|e| ShrimpScaleError::Model(e.to_string()))?;

        Ok(Self { session })
    }

    /// The trailing dimension the model declares for its first output, when
    /// it is static. Dynamic shapes resolve per frame instead.
    pub fn declared_trailing_dim(&self) -> Option<usize> {
        self.session
            .outputs
            .first()
            .and_then(|output| output.dimensions.last().copied().flatten())
            .map(|dim| dim as usize)
    }

    /// Run one frame through the model. The input is NCHW float, already
    /// normalized; the output is flattened to batch-0 [rows, fields].
    pub fn run(&self, input: Array4<f32>) -> Result<RawOutput> {
        let started = Instant::now();

        let input = CowArray::from(input.into_dyn());
        let value = Value::from_array(self.session.allocator(), &input)
            .map_err(|e| ShrimpScaleError::Model(e.to_string()))?;

        let outputs = self
            .session
            .run(vec![value])
            .map_err(|e| ShrimpScaleError::Model(e.to_string()))?;

        let tensor = outputs
            .first()
            .ok_or_else(|| ShrimpScaleError::Model("model produced no outputs".to_string()))?
            .try_extract::<f32>()
            .map_err(|e| ShrimpScaleError::Model(e.to_string()))?;
        let view = tensor.view();

        let shape = view.shape().to_vec();
        let (rows, fields) = match shape.as_slice() {
            [_, rows, fields] => (*rows, *fields),
            [rows, fields] => (*rows, *fields),
            other => {
                return Err(ShrimpScaleError::Model(format!(
                    "unsupported output shape {:?}",
                    other
                )))
            }
        };

        // Batch 0 only; anything beyond rows*fields belongs to other batches
        let mut flat: Vec<f32> = view.iter().copied().collect();
        flat.truncate(rows * fields);
        let rows = Array2::from_shape_vec((rows, fields), flat)
            .map_err(|e| ShrimpScaleError::Model(e.to_string()))?;

        let inference_time_ms = started.elapsed().as_secs_f32() * 1000.0;

        Ok(RawOutput {
            rows,
            inference_time_ms,
        })
    }
}
