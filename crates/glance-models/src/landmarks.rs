//! Face mesh landmark estimator via ONNX Runtime.
//!
//! Expects a face-mesh style export: the first output is a flat list of
//! `(x, y, z)` triples in input-pixel space (468 points, or 478 with refined
//! iris landmarks); an optional second output carries a face-presence score.
//!
//! The mesh model is run once per detected face on a square crop around the
//! detector's box, and its keypoints are mapped back into frame coordinates.

use crate::preprocess::image_to_nchw;
use crate::{LandmarkEstimator, ModelError};
use glance_core::{BoundingBox, Keypoint, LandmarkSet};
use glance_hw::Frame;
use image::{imageops, RgbImage};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const VALUES_PER_POINT: usize = 3;
const PRESENCE_THRESHOLD: f32 = 0.5;
/// Margin added on each side of the face box, as a fraction of its longer side.
const CROP_MARGIN: f32 = 0.25;

/// Pixel rectangle of the frame handed to the mesh model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CropRegion {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// ONNX landmark estimator, one mesh inference per face.
pub struct OnnxLandmarkEstimator {
    session: Session,
    input_size: usize,
}

impl OnnxLandmarkEstimator {
    /// Load the landmark model from the given path.
    pub fn load(model_path: &str, input_size: usize) -> Result<Self, ModelError> {
        if !Path::new(model_path).exists() {
            return Err(ModelError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            input_size,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded landmark model"
        );

        Ok(Self {
            session,
            input_size,
        })
    }

    fn estimate_region(
        &mut self,
        image: &RgbImage,
        region: CropRegion,
    ) -> Result<Option<LandmarkSet>, ModelError> {
        let has_presence = self.session.outputs().len() > 1;
        let crop = imageops::crop_imm(image, region.x, region.y, region.width, region.height)
            .to_image();
        let input = image_to_nchw(&crop, self.input_size);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        if has_presence {
            let (_, presence) = outputs[1]
                .try_extract_tensor::<f32>()
                .map_err(|e| ModelError::InferenceFailed(format!("presence: {e}")))?;
            if let Some(&raw) = presence.first() {
                if presence_probability(raw) < PRESENCE_THRESHOLD {
                    tracing::trace!(raw, "no face present");
                    return Ok(None);
                }
            }
        }

        let (_, points) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("landmarks: {e}")))?;

        decode_landmarks(points, self.input_size, region).map(Some)
    }
}

impl LandmarkEstimator for OnnxLandmarkEstimator {
    fn estimate(
        &mut self,
        frame: &Frame,
        faces: &[BoundingBox],
    ) -> Result<Vec<LandmarkSet>, ModelError> {
        let image = frame.to_rgb_image();
        let mut sets = Vec::with_capacity(faces.len());

        for face in faces {
            let set = match crop_region(face, frame.width, frame.height) {
                Some(region) => self.estimate_region(&image, region)?,
                None => None,
            };
            // An empty set keeps later faces aligned and classifies to nothing.
            sets.push(set.unwrap_or_default());
        }

        Ok(sets)
    }
}

/// Square region centred on the face box, grown by [`CROP_MARGIN`] and
/// clamped to the frame. `None` if the box lies outside the frame.
fn crop_region(face: &BoundingBox, frame_width: u32, frame_height: u32) -> Option<CropRegion> {
    let side = face.width.max(face.height) * (1.0 + 2.0 * CROP_MARGIN);
    let square = BoundingBox {
        x: face.x + face.width / 2.0 - side / 2.0,
        y: face.y + face.height / 2.0 - side / 2.0,
        width: side,
        height: side,
        confidence: face.confidence,
    };
    let clamped = square.clamp_to(frame_width, frame_height)?;

    let x = clamped.x.floor() as u32;
    let y = clamped.y.floor() as u32;
    let right = ((clamped.x + clamped.width).ceil() as u32).min(frame_width);
    let bottom = ((clamped.y + clamped.height).ceil() as u32).min(frame_height);
    if right <= x || bottom <= y {
        return None;
    }

    Some(CropRegion {
        x,
        y,
        width: right - x,
        height: bottom - y,
    })
}

/// Some exports emit the presence flag as a logit.
fn presence_probability(raw: f32) -> f32 {
    if (0.0..=1.0).contains(&raw) {
        raw
    } else {
        1.0 / (1.0 + (-raw).exp())
    }
}

/// Map flat `(x, y, z)` triples from input-pixel space back into the frame
/// through the crop they were computed on.
fn decode_landmarks(
    data: &[f32],
    input_size: usize,
    region: CropRegion,
) -> Result<LandmarkSet, ModelError> {
    if data.is_empty() || data.len() % VALUES_PER_POINT != 0 {
        return Err(ModelError::BadOutput(format!(
            "landmark output of {} values is not a list of (x, y, z) triples",
            data.len()
        )));
    }

    let sx = region.width as f32 / input_size as f32;
    let sy = region.height as f32 / input_size as f32;

    let keypoints = data
        .chunks_exact(VALUES_PER_POINT)
        .map(|p| Keypoint {
            x: region.x as f32 + p[0] * sx,
            y: region.y as f32 + p[1] * sy,
            z: Some(p[2]),
            name: None,
        })
        .collect();

    Ok(LandmarkSet::new(keypoints))
}
