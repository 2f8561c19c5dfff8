//! glance-models: Face detection and landmark estimation capabilities.
//!
//! Both are black boxes to the rest of the workspace: the traits here are the
//! seam, and the ONNX Runtime implementations simply invoke externally
//! supplied pretrained models and map their outputs into frame coordinates.

pub mod detector;
pub mod landmarks;
mod preprocess;

use glance_core::{BoundingBox, LandmarkSet};
use glance_hw::Frame;
use std::path::PathBuf;
use thiserror::Error;

pub use detector::OnnxFaceDetector;
pub use landmarks::OnnxLandmarkEstimator;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model file not found: {0}: place the ONNX model in the model directory")]
    ModelNotFound(String),
    #[error("unexpected model output: {0}")]
    BadOutput(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Locates faces in a frame.
pub trait FaceDetector {
    /// Bounding boxes of detected faces, most confident first.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, ModelError>;
}

/// Produces facial keypoints for the faces in a frame.
pub trait LandmarkEstimator {
    /// One landmark set per face box, in the same order as `faces`.
    fn estimate(
        &mut self,
        frame: &Frame,
        faces: &[BoundingBox],
    ) -> Result<Vec<LandmarkSet>, ModelError>;
}

/// Default model directory: `$XDG_DATA_HOME/glance/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("glance")
        .join("models")
}
