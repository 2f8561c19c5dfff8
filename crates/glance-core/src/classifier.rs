//! Landmark geometry emotion classifier.
//!
//! Measures three gaps between fixed keypoints and maps them to an emotion
//! through a first-match-wins threshold ladder. Distances are raw pixels; no
//! normalization by face size is applied, so the thresholds only hold for a
//! face at roughly webcam distance in a 640x480 frame.

use crate::landmarks::LandmarkSet;
use crate::types::{Classification, Emotion};

// --- Keypoint indices ---
const MOUTH_TOP: usize = 13;
const MOUTH_BOTTOM: usize = 14;
const BROW_INNER: usize = 3;
const BROW_OUTER: usize = 7;
const EYE_LEFT: usize = 1;
const EYE_RIGHT: usize = 4;

/// Sets with fewer points than this have undetermined geometry.
pub const MIN_KEYPOINTS: usize = 15;

// --- Thresholds (pixels) ---
const HAPPY_MOUTH_GAP: f32 = 20.0;
const SURPRISED_BROW_GAP: f32 = 15.0;
const ANGRY_EYE_GAP: f32 = 30.0;
const SAD_MOUTH_GAP: f32 = 10.0;

const NEUTRAL_CONFIDENCE: f32 = 0.6;

/// Gaps measured on one landmark set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkFeatures {
    /// Vertical distance between the mouth-top and mouth-bottom keypoints.
    pub mouth_gap: f32,
    /// Vertical distance between the inner and outer brow keypoints.
    pub brow_gap: f32,
    /// Horizontal distance between the two eye keypoints.
    pub eye_gap: f32,
}

impl LandmarkFeatures {
    /// Measure the gaps, or `None` if the set has fewer than [`MIN_KEYPOINTS`] points.
    pub fn measure(landmarks: &LandmarkSet) -> Option<Self> {
        if landmarks.len() < MIN_KEYPOINTS {
            return None;
        }
        let kp = &landmarks.keypoints;

        Some(Self {
            mouth_gap: (kp[MOUTH_BOTTOM].y - kp[MOUTH_TOP].y).abs(),
            brow_gap: (kp[BROW_OUTER].y - kp[BROW_INNER].y).abs(),
            eye_gap: (kp[EYE_RIGHT].x - kp[EYE_LEFT].x).abs(),
        })
    }

    /// Apply the threshold ladder. Order matters: the ranges overlap.
    pub fn classify(&self) -> Classification {
        let (emotion, confidence) = if self.mouth_gap > HAPPY_MOUTH_GAP {
            (Emotion::Happy, 0.8 + (self.mouth_gap - HAPPY_MOUTH_GAP) / 30.0)
        } else if self.brow_gap > SURPRISED_BROW_GAP {
            (Emotion::Surprised, 0.7 + (self.brow_gap - SURPRISED_BROW_GAP) / 20.0)
        } else if self.eye_gap < ANGRY_EYE_GAP {
            (Emotion::Angry, 0.75 + (ANGRY_EYE_GAP - self.eye_gap) / 20.0)
        } else if self.mouth_gap < SAD_MOUTH_GAP {
            (Emotion::Sad, 0.7 + (SAD_MOUTH_GAP - self.mouth_gap) / 10.0)
        } else {
            (Emotion::Neutral, NEUTRAL_CONFIDENCE)
        };

        Classification {
            emotion,
            confidence,
        }
    }
}

/// Classify one face's landmarks into an emotion with a confidence score.
///
/// Returns `None` for sets with fewer than [`MIN_KEYPOINTS`] points.
pub fn classify(landmarks: &LandmarkSet) -> Option<Classification> {
    let features = LandmarkFeatures::measure(landmarks)?;
    let result = features.classify();

    tracing::trace!(
        mouth_gap = features.mouth_gap,
        brow_gap = features.brow_gap,
        eye_gap = features.eye_gap,
        emotion = %result.emotion,
        confidence = result.confidence,
        "classified landmarks"
    );

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Keypoint;

    /// Build a 15-point set with the given gaps; every other point sits at the origin.
    fn face(mouth_gap: f32, brow_gap: f32, eye_gap: f32) -> LandmarkSet {
        let mut kp = vec![Keypoint::new(0.0, 0.0); MIN_KEYPOINTS];
        kp[MOUTH_TOP] = Keypoint::new(320.0, 300.0);
        kp[MOUTH_BOTTOM] = Keypoint::new(320.0, 300.0 + mouth_gap);
        kp[BROW_INNER] = Keypoint::new(300.0, 180.0);
        kp[BROW_OUTER] = Keypoint::new(260.0, 180.0 - brow_gap);
        kp[EYE_LEFT] = Keypoint::new(280.0, 200.0);
        kp[EYE_RIGHT] = Keypoint::new(280.0 + eye_gap, 200.0);
        LandmarkSet::new(kp)
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!((actual - expected).abs() < 1e-4, "{actual} vs {expected}");
    }

    #[test]
    fn test_too_few_keypoints() {
        for n in 0..MIN_KEYPOINTS {
            let set = LandmarkSet::from_points(&vec![(0.0, 0.0); n]);
            assert!(classify(&set).is_none(), "{n} points should not classify");
        }
    }

    #[test]
    fn test_exactly_min_keypoints_classifies() {
        assert!(classify(&face(15.0, 5.0, 60.0)).is_some());
    }

    #[test]
    fn test_pure() {
        let set = face(23.0, 17.0, 12.0);
        assert_eq!(classify(&set), classify(&set));
    }

    #[test]
    fn test_happy() {
        let c = classify(&face(25.0, 0.0, 60.0)).unwrap();
        assert_eq!(c.emotion, Emotion::Happy);
        assert_close(c.confidence, 0.8 + 5.0 / 30.0);
    }

    #[test]
    fn test_happy_boundary_is_strict() {
        let c = classify(&face(20.0, 0.0, 60.0)).unwrap();
        assert_ne!(c.emotion, Emotion::Happy);
        assert_eq!(c.emotion, Emotion::Neutral);

        let c = classify(&face(20.0001, 0.0, 60.0)).unwrap();
        assert_eq!(c.emotion, Emotion::Happy);
    }

    #[test]
    fn test_happy_wins_over_surprised() {
        let c = classify(&face(30.0, 40.0, 60.0)).unwrap();
        assert_eq!(c.emotion, Emotion::Happy);
    }

    #[test]
    fn test_surprised_wins_over_angry() {
        let c = classify(&face(15.0, 20.0, 10.0)).unwrap();
        assert_eq!(c.emotion, Emotion::Surprised);
        assert_close(c.confidence, 0.7 + 5.0 / 20.0);
    }

    #[test]
    fn test_angry_wins_over_sad() {
        let c = classify(&face(2.0, 0.0, 20.0)).unwrap();
        assert_eq!(c.emotion, Emotion::Angry);
        assert_close(c.confidence, 0.75 + 10.0 / 20.0);
    }

    #[test]
    fn test_sad() {
        let c = classify(&face(4.0, 0.0, 60.0)).unwrap();
        assert_eq!(c.emotion, Emotion::Sad);
        assert_close(c.confidence, 0.7 + 6.0 / 10.0);
    }

    #[test]
    fn test_neutral() {
        let c = classify(&face(15.0, 15.0, 30.0)).unwrap();
        assert_eq!(c.emotion, Emotion::Neutral);
        assert_close(c.confidence, 0.6);
    }

    #[test]
    fn test_confidence_increases_with_feature() {
        let happy: Vec<f32> = [21.0, 25.0, 30.0, 40.0]
            .iter()
            .map(|&m| classify(&face(m, 0.0, 60.0)).unwrap().confidence)
            .collect();
        assert!(happy.windows(2).all(|w| w[1] > w[0]), "happy: {happy:?}");

        let surprised: Vec<f32> = [16.0, 18.0, 25.0]
            .iter()
            .map(|&b| classify(&face(15.0, b, 60.0)).unwrap().confidence)
            .collect();
        assert!(surprised.windows(2).all(|w| w[1] > w[0]), "surprised: {surprised:?}");

        // Angry grows as the eyes get closer.
        let angry: Vec<f32> = [29.0, 20.0, 5.0]
            .iter()
            .map(|&e| classify(&face(15.0, 0.0, e)).unwrap().confidence)
            .collect();
        assert!(angry.windows(2).all(|w| w[1] > w[0]), "angry: {angry:?}");

        // Sad grows as the mouth closes.
        let sad: Vec<f32> = [9.0, 5.0, 0.0]
            .iter()
            .map(|&m| classify(&face(m, 0.0, 60.0)).unwrap().confidence)
            .collect();
        assert!(sad.windows(2).all(|w| w[1] > w[0]), "sad: {sad:?}");
    }

    #[test]
    fn test_gaps_are_absolute() {
        // Mouth bottom above mouth top still counts as an open mouth.
        let mut set = face(0.0, 0.0, 60.0);
        set.keypoints[MOUTH_BOTTOM].y = set.keypoints[MOUTH_TOP].y - 25.0;
        assert_eq!(classify(&set).unwrap().emotion, Emotion::Happy);
    }

    #[test]
    fn test_extra_keypoints_ignored() {
        let mut set = face(25.0, 0.0, 60.0);
        set.keypoints.extend(vec![Keypoint::new(1.0, 1.0); 463]);
        assert_eq!(classify(&set).unwrap().emotion, Emotion::Happy);
    }
}
