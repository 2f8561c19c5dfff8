//! Face detector via ONNX Runtime.
//!
//! Expects an end-to-end export whose first output holds one row per
//! candidate, `[x1, y1, x2, y2, score, ...]`, with coordinates normalized to
//! `[0, 1]`. Anchor decoding and suppression are the model's business.

use crate::preprocess::to_nchw;
use crate::{FaceDetector, ModelError};
use glance_core::BoundingBox;
use glance_hw::Frame;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const DETECTOR_ROW_MIN: usize = 5;

/// ONNX face detector configured for a fixed number of faces.
pub struct OnnxFaceDetector {
    session: Session,
    input_size: usize,
    score_threshold: f32,
    max_faces: usize,
}

impl OnnxFaceDetector {
    /// Load the detector model from the given path.
    pub fn load(
        model_path: &str,
        input_size: usize,
        score_threshold: f32,
        max_faces: usize,
    ) -> Result<Self, ModelError> {
        if !Path::new(model_path).exists() {
            return Err(ModelError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            input_size,
            max_faces,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face detector"
        );

        Ok(Self {
            session,
            input_size,
            score_threshold,
            max_faces,
        })
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, ModelError> {
        let input = to_nchw(frame, self.input_size);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("detections: {e}")))?;

        let row_len = shape.last().copied().unwrap_or(0).max(0) as usize;
        let faces = decode_detections(
            data,
            row_len,
            frame.width,
            frame.height,
            self.score_threshold,
            self.max_faces,
        )?;

        tracing::trace!(faces = faces.len(), seq = frame.sequence, "detect");
        Ok(faces)
    }
}

/// Map normalized detector rows to frame-space boxes, best first, capped at `max_faces`.
fn decode_detections(
    data: &[f32],
    row_len: usize,
    frame_width: u32,
    frame_height: u32,
    threshold: f32,
    max_faces: usize,
) -> Result<Vec<BoundingBox>, ModelError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if row_len < DETECTOR_ROW_MIN || data.len() % row_len != 0 {
        return Err(ModelError::BadOutput(format!(
            "detector rows must have at least {DETECTOR_ROW_MIN} values, got row length {row_len} over {} values",
            data.len()
        )));
    }

    let (fw, fh) = (frame_width as f32, frame_height as f32);
    let mut faces: Vec<BoundingBox> = data
        .chunks_exact(row_len)
        .filter(|row| row[4] > threshold)
        .map(|row| {
            let x1 = row[0].clamp(0.0, 1.0) * fw;
            let y1 = row[1].clamp(0.0, 1.0) * fh;
            let x2 = row[2].clamp(0.0, 1.0) * fw;
            let y2 = row[3].clamp(0.0, 1.0) * fh;
            BoundingBox {
                x: x1.min(x2),
                y: y1.min(y2),
                width: (x2 - x1).abs(),
                height: (y2 - y1).abs(),
                confidence: row[4],
            }
        })
        .filter(|b| b.width > 0.0 && b.height > 0.0)
        .collect();

    faces.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    faces.truncate(max_faces);
    Ok(faces)
}
