//! Facial landmark sets produced by the external landmark estimator.

use serde::{Deserialize, Serialize};

/// A single 2D facial keypoint in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: None,
            name: None,
        }
    }
}

/// Ordered keypoints for one face in one frame. Not retained across frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    pub keypoints: Vec<Keypoint>,
}

impl LandmarkSet {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self { keypoints }
    }

    /// Build a set from plain `(x, y)` pairs.
    pub fn from_points(points: &[(f32, f32)]) -> Self {
        Self {
            keypoints: points.iter().map(|&(x, y)| Keypoint::new(x, y)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Keypoint> {
        self.keypoints.get(index)
    }

    /// Parse a set from JSON: an array of `{ "x": .., "y": .. }` objects.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_preserves_order() {
        let set = LandmarkSet::from_points(&[(1.0, 2.0), (3.0, 4.0)]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(1), Some(&Keypoint::new(3.0, 4.0)));
        assert!(set.get(2).is_none());
    }

    #[test]
    fn test_from_json_array() {
        let set = LandmarkSet::from_json(
            r#"[{"x": 1.5, "y": 2.0}, {"x": 3.0, "y": 4.0, "z": -0.5, "name": "lips"}]"#,
        )
        .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.keypoints[0].z, None);
        assert_eq!(set.keypoints[1].z, Some(-0.5));
        assert_eq!(set.keypoints[1].name.as_deref(), Some("lips"));
    }

    #[test]
    fn test_from_json_rejects_object() {
        assert!(LandmarkSet::from_json(r#"{"x": 1.0}"#).is_err());
    }
}
