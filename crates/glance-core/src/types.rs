use serde::{Deserialize, Serialize};
use std::fmt;

/// Bounding box for a detected face, in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// Clamp the box to a `width` x `height` frame.
    ///
    /// Returns `None` when nothing of the box remains inside the frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BoundingBox> {
        let x1 = self.x.max(0.0);
        let y1 = self.y.max(0.0);
        let x2 = (self.x + self.width).min(width as f32);
        let y2 = (self.y + self.height).min(height as f32);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: self.confidence,
        })
    }
}

/// Coarse emotion label derived from landmark geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Surprised,
    Neutral,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Surprised => "surprised",
            Emotion::Neutral => "neutral",
        }
    }

    /// Capitalized label for user-facing text ("Happy").
    pub fn title(&self) -> &'static str {
        match self {
            Emotion::Happy => "Happy",
            Emotion::Sad => "Sad",
            Emotion::Angry => "Angry",
            Emotion::Surprised => "Surprised",
            Emotion::Neutral => "Neutral",
        }
    }

    /// Badge colour used when an alert for this emotion is shown.
    pub fn badge_color(&self) -> [u8; 3] {
        match self {
            Emotion::Happy => [0x22, 0xc5, 0x5e],
            Emotion::Surprised => [0xea, 0xb3, 0x08],
            Emotion::Angry => [0xef, 0x44, 0x44],
            Emotion::Sad => [0x3b, 0x82, 0xf6],
            Emotion::Neutral => [0x6b, 0x72, 0x80],
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one landmark set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub emotion: Emotion,
    /// Heuristic score, not a probability. Grows with the distance past the
    /// triggering threshold and is not clamped to 1.0.
    pub confidence: f32,
}
